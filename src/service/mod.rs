// 业务服务层模块
pub mod user_service;

pub use user_service::UserService;

// 数据访问层模块
pub mod user_repo;

// 重新导出 PostgreSQL Repository 实现
pub use user_repo::{PgUserRepository, UserStore};

//! 数据模型模块

pub mod user;

pub use user::{User, UserStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use uuid::Uuid;

/// 用户账号状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[repr(i16)]
pub enum UserStatus {
    /// 停用
    Disabled = 0,
    /// 正常
    Normal = 1,
}

impl UserStatus {
    pub fn from_db(value: i16) -> Self {
        match value {
            0 => UserStatus::Disabled,
            _ => UserStatus::Normal,
        }
    }
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Normal
    }
}

/// 用户信息
///
/// 用户使用手机号注册，默认没有密码，`username` 初始值与手机号相同。
/// 会话核心只消费其中的最小属性集：id、状态、多端登录开关、密码哈希。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// 用户 ID（数据库中是 BIGINT）
    pub id: i64,
    /// 用户 UUID
    pub uuid: String,
    /// 手机号（唯一）
    pub phone: String,
    /// 用户名（唯一，默认为手机号）
    pub username: String,
    /// 密码哈希（bcrypt），手机号注册的账号可以没有密码
    #[serde(skip_serializing, default)]
    pub password: Option<String>,
    /// 昵称
    pub nickname: Option<String>,
    /// 账号状态
    pub status: UserStatus,
    /// 超级管理员
    pub is_admin: bool,
    /// 是否允许多端登录
    pub is_multi_login: bool,
    /// 注册时间
    pub join_time: DateTime<Utc>,
    /// 上次登录时间
    pub last_login_time: Option<DateTime<Utc>>,
}

impl User {
    /// 创建新用户（手机号注册，用户名默认为手机号）
    pub fn new(phone: &str) -> Self {
        Self {
            id: 0,
            uuid: Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            username: phone.to_string(),
            password: None,
            nickname: None,
            status: UserStatus::Normal,
            is_admin: false,
            is_multi_login: false,
            join_time: Utc::now(),
            last_login_time: None,
        }
    }

    /// 账号是否可用
    pub fn is_enabled(&self) -> bool {
        self.status == UserStatus::Normal
    }
}

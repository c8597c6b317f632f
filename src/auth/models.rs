use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::user::User;

/// 缺少 session_uuid 声明的 token 回退使用的会话标识
/// 仅在配置开启 allow_debug_session 时生效
pub const DEBUG_SESSION_UUID: &str = "debug";

/// 正常登录渠道
pub const LOGIN_TYPE_WEB: &str = "web";

/// 工具类登录渠道（不出现在会话列表中）
pub const LOGIN_TYPE_INTERNAL: &str = "internal";

/// access token 解码后的载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    /// 用户 ID（sub 声明）
    pub id: i64,
    /// 会话唯一标识
    pub session_uuid: String,
    /// 过期时间戳（Unix 秒）
    pub expire_time: i64,
}

/// refresh token 解码后的载荷（不含会话标识）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshPayload {
    /// 用户 ID（sub 声明）
    pub id: i64,
    /// 过期时间戳（Unix 秒）
    pub expire_time: i64,
}

/// 签发的 access token
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub access_token_expire_time: DateTime<Utc>,
    pub session_uuid: String,
}

/// 签发的 refresh token
#[derive(Debug, Clone, Serialize)]
pub struct RefreshToken {
    pub refresh_token: String,
    pub refresh_token_expire_time: DateTime<Utc>,
}

/// 刷新后的新 token 对
#[derive(Debug, Clone, Serialize)]
pub struct NewToken {
    pub new_access_token: String,
    pub new_access_token_expire_time: DateTime<Utc>,
    pub new_refresh_token: String,
    pub new_refresh_token_expire_time: DateTime<Utc>,
    pub session_uuid: String,
}

/// 会话附加信息
///
/// 以 JSON 存入缓存，key 为会话标识，过期时间与 access token 一致。
/// 属于尽力而为的数据：缺失不影响会话有效性，只影响会话列表展示。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionExtraInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// 登录渠道标记
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_type: Option<String>,
    /// 向前兼容的扩展字段
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// 登录请求（手机号或用户名至少提供其一）
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub phone: Option<String>,
    pub username: Option<String>,
    pub password: String,
}

/// 请求方的客户端上下文（由传输层中间件解析填充）
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub device: Option<String>,
}

/// 登录结果
#[derive(Debug, Clone, Serialize)]
pub struct LoginInfo {
    pub access_token: String,
    pub access_token_expire_time: DateTime<Utc>,
    pub session_uuid: String,
    /// refresh token 由调用方通过 HttpOnly Cookie 下发
    pub refresh_token: String,
    pub refresh_token_expire_time: DateTime<Utc>,
    pub user: User,
}

/// 会话列表项
#[derive(Debug, Clone, Serialize)]
pub struct LoginTokenDetail {
    pub id: i64,
    pub session_uuid: String,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub ip: Option<String>,
    pub os: Option<String>,
    pub browser: Option<String>,
    pub device: Option<String>,
    /// 是否在线（来自在线会话集合，仅用于展示）
    pub online: bool,
    pub last_login_time: Option<String>,
    pub expire_time: i64,
}

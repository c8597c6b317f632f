use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 服务器错误类型
///
/// 业务错误（NotFound / Forbidden / TokenExpired / InvalidToken / InvalidRequest）
/// 在检测点构造并携带可读消息，原样传播到传输层；
/// 基础设施错误（Database / Cache / Timeout 等）与业务错误区分开，统一映射为 500。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerError {
    /// 资源未找到
    NotFound(String),
    /// 禁止访问（账号停用、凭证错误、权限不足）
    Forbidden(String),
    /// Token 已过期（签名过期或缓存中已不存在）
    TokenExpired(String),
    /// 无效令牌（格式错误、签名不匹配、缺少必要声明）
    InvalidToken(String),
    /// 无效的请求（缺少必要的标识字段等）
    InvalidRequest(String),
    /// 数据库错误
    Database(String),
    /// 缓存错误
    Cache(String),
    /// 超时错误
    Timeout(String),
    /// 序列化错误
    Serialization(String),
    /// 配置错误
    Configuration(String),
    /// 内部错误
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ServerError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ServerError::TokenExpired(msg) => write!(f, "Token expired: {}", msg),
            ServerError::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            ServerError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ServerError::Database(msg) => write!(f, "Database error: {}", msg),
            ServerError::Cache(msg) => write!(f, "Cache error: {}", msg),
            ServerError::Timeout(msg) => write!(f, "Timeout error: {}", msg),
            ServerError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            ServerError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            ServerError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for ServerError {}

impl ServerError {
    /// 传输层 HTTP 状态码映射
    ///
    /// 401 对应 token 类错误，403 禁止访问，404 未找到，400 请求错误，其余 500
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::TokenExpired(_) | ServerError::InvalidToken(_) => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::NotFound(_) => 404,
            ServerError::InvalidRequest(_) => 400,
            _ => 500,
        }
    }

}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ServerError::Timeout(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;

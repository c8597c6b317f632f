// 认证模块 - Token 签发/校验、密码校验与会话生命周期管理

pub mod jwt;
pub mod models;
pub mod password;
pub mod session_manager;
pub mod token_service;

// 重新导出主要类型
pub use jwt::JwtCodec;
pub use models::{
    AccessToken, ClientContext, LoginInfo, LoginRequest, LoginTokenDetail, NewToken, RefreshToken,
    SessionExtraInfo, TokenPayload, DEBUG_SESSION_UUID, LOGIN_TYPE_INTERNAL, LOGIN_TYPE_WEB,
};
pub use password::{hash_password, verify_optional_password, verify_password};
pub use session_manager::SessionManager;
pub use token_service::TokenService;

pub mod auth;
pub mod config;
pub mod error;
pub mod infra;
pub mod logging;
pub mod model;
pub mod repository;
pub mod service;

pub use auth::{JwtCodec, SessionManager, TokenService};
pub use config::{AuthConfig, RedisConfig, TokenConfig};
pub use error::{Result, ServerError};
pub use infra::{KvCache, MemoryCache, RedisClient};
pub use model::{User, UserStatus};
pub use repository::{PgUserRepository, UserStore};
pub use service::UserService;

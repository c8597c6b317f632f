//! 用户服务
//!
//! 注册、查询和注销用户。注销用户时同步清理其全部会话和缓存，
//! 避免已删除账号的 token 在过期前仍然可用。

use std::sync::Arc;

use tracing::info;

use crate::auth::password::hash_password;
use crate::config::TokenConfig;
use crate::error::{Result, ServerError};
use crate::infra::kv::KvCache;
use crate::model::user::User;
use crate::repository::user_repo::UserStore;

/// 用户服务
pub struct UserService {
    users: Arc<dyn UserStore>,
    cache: Arc<dyn KvCache>,
    config: TokenConfig,
}

impl UserService {
    /// 创建新的用户服务
    pub fn new(config: TokenConfig, users: Arc<dyn UserStore>, cache: Arc<dyn KvCache>) -> Self {
        Self {
            users,
            cache,
            config,
        }
    }

    /// 注册用户（手机号唯一）
    pub async fn register(&self, phone: &str, password: &str) -> Result<User> {
        if self.users.find_by_phone(phone).await?.is_some() {
            return Err(ServerError::InvalidRequest("用户已经注册".to_string()));
        }

        let mut user = User::new(phone);
        user.password = Some(hash_password(password)?);

        let id = self.users.create(&user).await?;
        user.id = id;

        info!("✅ 用户注册成功: user_id={}, phone={}", user.id, user.phone);
        Ok(user)
    }

    /// 获取用户信息
    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServerError::NotFound("用户不存在".to_string()))
    }

    /// 注销用户
    ///
    /// 超级管理员不可删除。删除成功后清理该用户的 access / refresh key
    /// 与用户信息缓存，会话立即失效。
    pub async fn delete_user(&self, user_id: i64) -> Result<()> {
        let user = self.get_user(user_id).await?;
        if user.is_admin {
            return Err(ServerError::Forbidden("超级管理员不允许删除".to_string()));
        }

        self.users.delete(user_id).await?;

        self.cache
            .delete_prefix(&self.config.access_prefix(user_id))
            .await?;
        self.cache
            .delete_prefix(&self.config.refresh_key_prefix(user_id))
            .await?;
        self.cache.del(&self.config.user_cache_key(user_id)).await?;

        info!("用户已注销: user_id={}", user_id);
        Ok(())
    }
}

//! 会话管理器
//!
//! 编排凭证校验、Token 编解码和会话存储，实现登录、刷新（轮换）、
//! 登出和 Bearer 认证。多端登录策略在签发时生效：未开启多端登录的
//! 用户每次签发都会按前缀清掉此前所有的 access / refresh key。
//!
//! 并发模型：所有操作都是 I/O 绑定的异步请求处理，不做进程内加锁。
//! 单端策略依赖缓存的单 key 原子性，跨 key 的"读-清-写"序列不是事务，
//! 同一用户并发登录可能交错，接受最终一致（后写者胜）。

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::auth::jwt::JwtCodec;
use crate::auth::models::{
    AccessToken, ClientContext, LoginInfo, LoginRequest, NewToken, RefreshToken, SessionExtraInfo,
    LOGIN_TYPE_WEB,
};
use crate::auth::password::verify_optional_password;
use crate::config::TokenConfig;
use crate::error::{Result, ServerError};
use crate::infra::kv::KvCache;
use crate::model::user::User;
use crate::repository::user_repo::UserStore;

/// 登录时间的展示格式
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 会话管理器
pub struct SessionManager {
    codec: JwtCodec,
    cache: Arc<dyn KvCache>,
    users: Arc<dyn UserStore>,
    config: TokenConfig,
}

impl SessionManager {
    /// 创建会话管理器（缓存与用户存储作为已构造的依赖显式注入）
    pub fn new(
        config: TokenConfig,
        cache: Arc<dyn KvCache>,
        users: Arc<dyn UserStore>,
    ) -> Result<Self> {
        let codec = JwtCodec::new(&config)?;

        Ok(Self {
            codec,
            cache,
            users,
            config,
        })
    }

    /// 签发 access token 并写入会话存储
    ///
    /// 未开启多端登录时，先按前缀清掉该用户所有旧的 access key，
    /// 新登录无条件使此前的会话失效。
    pub async fn create_access_token(
        &self,
        user_id: i64,
        multi_login: bool,
        extra: Option<&SessionExtraInfo>,
    ) -> Result<AccessToken> {
        let expire = Utc::now() + Duration::seconds(self.config.expire_seconds);
        let session_uuid = Uuid::new_v4().to_string();

        let access_token = self.codec.encode_access(user_id, &session_uuid, expire)?;

        if !multi_login {
            self.cache
                .delete_prefix(&self.config.access_prefix(user_id))
                .await?;
        }

        self.cache
            .setex(
                &self.config.access_key(user_id, &session_uuid),
                self.config.expire_seconds as u64,
                &access_token,
            )
            .await?;

        // 附加信息与 access token 同生命周期，缺失只影响会话列表展示
        if let Some(extra) = extra {
            self.cache
                .setex(
                    &self.config.extra_info_key(&session_uuid),
                    self.config.expire_seconds as u64,
                    &serde_json::to_string(extra)?,
                )
                .await?;
        }

        Ok(AccessToken {
            access_token,
            access_token_expire_time: expire,
            session_uuid,
        })
    }

    /// 签发 refresh token 并写入会话存储
    ///
    /// refresh token 自身的字符串就是 key 后缀，存储值与 key 中的
    /// token 相同：有效性完全由"存在且相等"定义，不再复验签名。
    pub async fn create_refresh_token(
        &self,
        user_id: i64,
        multi_login: bool,
    ) -> Result<RefreshToken> {
        let expire = Utc::now() + Duration::seconds(self.config.refresh_expire_seconds);

        let refresh_token = self.codec.encode_refresh(user_id, expire)?;

        if !multi_login {
            self.cache
                .delete_prefix(&self.config.refresh_key_prefix(user_id))
                .await?;
        }

        self.cache
            .setex(
                &self.config.refresh_key(user_id, &refresh_token),
                self.config.refresh_expire_seconds as u64,
                &refresh_token,
            )
            .await?;

        Ok(RefreshToken {
            refresh_token,
            refresh_token_expire_time: expire,
        })
    }

    /// 登录
    ///
    /// 1. 按手机号或用户名解析用户，校验密码与账号状态
    /// 2. 签发 access + refresh token 对，写入会话存储
    /// 3. 会话加入在线集合，返回 token 对与会话标识
    ///
    /// refresh token 由调用方通过 HttpOnly Cookie 下发，access token
    /// 由客户端放入 Authorization 头。
    pub async fn login(&self, request: &LoginRequest, ctx: &ClientContext) -> Result<LoginInfo> {
        match self.try_login(request, ctx).await {
            Ok(info) => {
                info!(
                    "✅ 用户登录成功: user_id={}, session_uuid={}",
                    info.user.id, info.session_uuid
                );
                Ok(info)
            }
            Err(e @ ServerError::NotFound(_)) => {
                error!("登录错误: 账户不存在");
                Err(e)
            }
            Err(e @ ServerError::Forbidden(_)) => {
                error!("登录错误: 账户或密码错误");
                Err(e)
            }
            // 未预期的错误记录后原样上抛，保留根因
            Err(e) => {
                error!("登录错误: {}", e);
                Err(e)
            }
        }
    }

    async fn try_login(&self, request: &LoginRequest, ctx: &ClientContext) -> Result<LoginInfo> {
        let user = self.resolve_user(request).await?;

        if !verify_optional_password(&request.password, user.password.as_deref()) {
            return Err(ServerError::Forbidden("用户名或密码有误".to_string()));
        }
        if !user.is_enabled() {
            return Err(ServerError::Forbidden(
                "用户已被锁定，请联系系统管理员".to_string(),
            ));
        }

        self.users.update_login_time(&user.phone).await?;
        let login_time = Utc::now();

        let extra = self.build_extra_info(&user, ctx, login_time);
        let access = self
            .create_access_token(user.id, user.is_multi_login, Some(&extra))
            .await?;
        let refresh = self
            .create_refresh_token(user.id, user.is_multi_login)
            .await?;

        self.cache
            .sadd(&self.config.online_key, &access.session_uuid)
            .await?;

        let mut user = user;
        user.last_login_time = Some(login_time);
        // 登录结果里的用户信息同样不携带密码哈希
        user.password = None;

        Ok(LoginInfo {
            access_token: access.access_token,
            access_token_expire_time: access.access_token_expire_time,
            session_uuid: access.session_uuid,
            refresh_token: refresh.refresh_token,
            refresh_token_expire_time: refresh.refresh_token_expire_time,
            user,
        })
    }

    async fn resolve_user(&self, request: &LoginRequest) -> Result<User> {
        let user = if let Some(phone) = request.phone.as_deref() {
            self.users.find_by_phone(phone).await?
        } else if let Some(username) = request.username.as_deref() {
            self.users.find_by_username(username).await?
        } else {
            return Err(ServerError::InvalidRequest(
                "手机号或用户名必须提供其一".to_string(),
            ));
        };

        user.ok_or_else(|| ServerError::NotFound("用户名或密码有误".to_string()))
    }

    fn build_extra_info(
        &self,
        user: &User,
        ctx: &ClientContext,
        login_time: chrono::DateTime<Utc>,
    ) -> SessionExtraInfo {
        SessionExtraInfo {
            username: Some(user.username.clone()),
            nickname: user.nickname.clone(),
            last_login_time: Some(login_time.format(DATETIME_FORMAT).to_string()),
            ip: ctx.ip.clone(),
            os: ctx.os.clone(),
            browser: ctx.browser.clone(),
            device: ctx.device.clone(),
            login_type: Some(LOGIN_TYPE_WEB.to_string()),
            ..Default::default()
        }
    }

    /// 用 refresh token 轮换出新的 token 对
    ///
    /// 1. refresh token 必须在存储中存在且与呈递值相等，否则视为已过期
    ///    （覆盖已撤销、已轮换两种情况）
    /// 2. 解码旧 access token 找回待退役的会话（容忍其签名已过期）
    /// 3. 重新校验用户存在且可用
    /// 4. 先写新 key 再删旧 key：中途崩溃最多短暂出现两对有效 token，
    ///    绝不会让用户两手空空
    pub async fn refresh(
        &self,
        access_token: &str,
        refresh_token: &str,
        ctx: &ClientContext,
    ) -> Result<NewToken> {
        let refresh_payload = self
            .codec
            .decode_refresh(refresh_token)
            .map_err(|_| ServerError::TokenExpired("Refresh Token 失效".to_string()))?;
        let user_id = refresh_payload.id;

        let refresh_key = self.config.refresh_key(user_id, refresh_token);
        let stored = self.cache.get(&refresh_key).await?;
        if stored.as_deref() != Some(refresh_token) {
            return Err(ServerError::TokenExpired(
                "Refresh Token 已过期，请重新登录".to_string(),
            ));
        }

        let old_payload = self.codec.decode_allow_expired(access_token)?;
        if old_payload.id != user_id {
            return Err(ServerError::InvalidToken("Token 无效".to_string()));
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServerError::NotFound("用户不存在".to_string()))?;
        if !user.is_enabled() {
            return Err(ServerError::Forbidden(
                "用户已被锁定，请联系系统管理员".to_string(),
            ));
        }

        let extra = self.build_extra_info(&user, ctx, Utc::now());
        let new_access = self
            .create_access_token(user.id, user.is_multi_login, Some(&extra))
            .await?;
        let new_refresh = self
            .create_refresh_token(user.id, user.is_multi_login)
            .await?;

        // 新 key 已落盘，删除旧 token 防止重放
        self.cache
            .del(&self.config.access_key(user_id, &old_payload.session_uuid))
            .await?;
        self.cache.del(&refresh_key).await?;
        self.cache
            .srem(&self.config.online_key, &old_payload.session_uuid)
            .await?;
        self.cache
            .sadd(&self.config.online_key, &new_access.session_uuid)
            .await?;

        debug!(
            "Token 轮换完成: user_id={}, 旧会话={}, 新会话={}",
            user_id, old_payload.session_uuid, new_access.session_uuid
        );

        Ok(NewToken {
            new_access_token: new_access.access_token,
            new_access_token_expire_time: new_access.access_token_expire_time,
            new_refresh_token: new_refresh.refresh_token,
            new_refresh_token_expire_time: new_refresh.refresh_token_expire_time,
            session_uuid: new_access.session_uuid,
        })
    }

    /// 登出
    ///
    /// 尽力而为：access token 解析失败直接返回成功，调用方仍需清理
    /// 客户端 Cookie。开启多端登录只清当前会话的 key；未开启则按前缀
    /// 清掉该用户全部 access / refresh key，防止簿记漂移留下残留会话。
    pub async fn logout(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        let payload = match self.codec.decode_allow_expired(access_token) {
            Ok(payload) => payload,
            Err(e) => {
                debug!("登出时 Token 解析失败，忽略: {}", e);
                return Ok(());
            }
        };
        let user_id = payload.id;

        self.cache
            .srem(&self.config.online_key, &payload.session_uuid)
            .await?;
        self.cache
            .del(&self.config.extra_info_key(&payload.session_uuid))
            .await?;

        let multi_login = self
            .users
            .find_by_id(user_id)
            .await
            .ok()
            .flatten()
            .map(|u| u.is_multi_login)
            .unwrap_or(false);

        if multi_login {
            self.cache
                .del(&self.config.access_key(user_id, &payload.session_uuid))
                .await?;
            if let Some(refresh_token) = refresh_token {
                self.cache
                    .del(&self.config.refresh_key(user_id, refresh_token))
                    .await?;
            }
        } else {
            self.cache
                .delete_prefix(&self.config.access_prefix(user_id))
                .await?;
            self.cache
                .delete_prefix(&self.config.refresh_key_prefix(user_id))
                .await?;
        }

        info!("用户登出: user_id={}, session_uuid={}", user_id, payload.session_uuid);
        Ok(())
    }

    /// Bearer 认证：校验 access token 并解析出当前用户
    ///
    /// token 签名有效还不够，对应的 access key 必须仍在会话存储中
    /// （登出、被踢、单端淘汰都会使其消失）。用户信息优先走缓存，
    /// 未命中再查库并回填。
    pub async fn authenticate(&self, access_token: &str) -> Result<User> {
        let payload = self.codec.decode(access_token)?;
        let user_id = payload.id;

        let token_verify = self
            .cache
            .get(&self.config.access_key(user_id, &payload.session_uuid))
            .await?;
        if token_verify.is_none() {
            return Err(ServerError::TokenExpired("Token 已过期".to_string()));
        }

        let user_cache_key = self.config.user_cache_key(user_id);
        if let Some(cached) = self.cache.get(&user_cache_key).await? {
            if let Ok(user) = serde_json::from_str::<User>(&cached) {
                return Ok(user);
            }
            // 缓存内容损坏时回源重建
            self.cache.del(&user_cache_key).await?;
        }

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ServerError::InvalidToken("登录用户不存在".to_string()))?;
        if !user.is_enabled() {
            return Err(ServerError::Forbidden(
                "用户已被锁定，请联系系统管理员".to_string(),
            ));
        }

        // 密码哈希只服务于登录校验，不随用户信息外泄
        user.password = None;

        self.cache
            .setex(
                &user_cache_key,
                self.config.user_cache_expire_seconds as u64,
                &serde_json::to_string(&user)?,
            )
            .await?;

        Ok(user)
    }
}

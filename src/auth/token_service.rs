//! 会话查询与强制下线
//!
//! 面向管理端的会话操作：枚举会话存储中的在线/离线会话，
//! 以及把指定会话踢下线。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::jwt::JwtCodec;
use crate::auth::models::{LoginTokenDetail, SessionExtraInfo, DEBUG_SESSION_UUID, LOGIN_TYPE_INTERNAL};
use crate::config::TokenConfig;
use crate::error::{Result, ServerError};
use crate::infra::kv::KvCache;

/// 会话管理服务（管理端）
pub struct TokenService {
    codec: JwtCodec,
    cache: Arc<dyn KvCache>,
    config: TokenConfig,
}

impl TokenService {
    pub fn new(config: TokenConfig, cache: Arc<dyn KvCache>) -> Result<Self> {
        let codec = JwtCodec::new(&config)?;

        Ok(Self {
            codec,
            cache,
            config,
        })
    }

    /// 枚举会话
    ///
    /// 扫描所有 access key 还原会话清单。debug 会话和内部服务会话
    /// 不对管理端展示；`username` 过滤依赖附加信息，附加信息缺失的
    /// 会话在按用户名过滤时一并跳过。
    pub async fn list_sessions(&self, username: Option<&str>) -> Result<Vec<LoginTokenDetail>> {
        let prefix = format!("{}:", self.config.token_prefix);
        let online = self.cache.smembers(&self.config.online_key).await?;

        let mut details = Vec::new();
        let mut live: HashSet<String> = HashSet::new();

        for key in self.cache.keys(&prefix).await? {
            let Some((user_id, session_uuid)) = Self::parse_access_key(&prefix, &key) else {
                warn!("跳过无法解析的会话 key: {}", key);
                continue;
            };
            live.insert(session_uuid.to_string());
            if session_uuid == DEBUG_SESSION_UUID {
                continue;
            }

            // key 可能在扫描与读取之间过期
            let Some(token) = self.cache.get(&key).await? else {
                continue;
            };
            let payload = match self.codec.decode(&token) {
                Ok(payload) => payload,
                Err(_) => continue,
            };

            let extra: Option<SessionExtraInfo> = match self
                .cache
                .get(&self.config.extra_info_key(&session_uuid))
                .await?
            {
                Some(raw) => serde_json::from_str(&raw).ok(),
                None => None,
            };

            if let Some(extra) = &extra {
                if extra.login_type.as_deref() == Some(LOGIN_TYPE_INTERNAL) {
                    continue;
                }
                if let Some(filter) = username {
                    if extra.username.as_deref() != Some(filter) {
                        continue;
                    }
                }
            } else if username.is_some() {
                continue;
            }

            let extra = extra.unwrap_or_default();
            details.push(LoginTokenDetail {
                id: user_id,
                session_uuid: session_uuid.to_string(),
                username: extra.username,
                nickname: extra.nickname,
                ip: extra.ip,
                os: extra.os,
                browser: extra.browser,
                device: extra.device,
                last_login_time: extra.last_login_time,
                online: online.iter().any(|s| s == session_uuid),
                expire_time: payload.expire_time,
            });
        }

        // 被挤下线或自然过期的会话没人替它 srem，扫描时顺带清掉，
        // 防止在线集合无界增长
        for member in &online {
            if !live.contains(member) {
                self.cache.srem(&self.config.online_key, member).await?;
            }
        }

        Ok(details)
    }

    /// 强制下线指定会话
    ///
    /// 删除该会话的 access key 与附加信息，并清掉该用户的全部
    /// refresh key，阻断被踢会话靠刷新复活。
    pub async fn kick_out(&self, user_id: i64, session_uuid: &str) -> Result<()> {
        let access_key = self.config.access_key(user_id, session_uuid);
        if self.cache.get(&access_key).await?.is_none() {
            return Err(ServerError::NotFound("会话不存在或已过期".to_string()));
        }

        self.cache.del(&access_key).await?;
        self.cache
            .del(&self.config.extra_info_key(session_uuid))
            .await?;
        self.cache
            .delete_prefix(&self.config.refresh_key_prefix(user_id))
            .await?;
        self.cache
            .srem(&self.config.online_key, session_uuid)
            .await?;

        info!("会话已强制下线: user_id={}, session_uuid={}", user_id, session_uuid);
        Ok(())
    }

    /// 从完整的 access key 解析出 user_id 与 session_uuid
    fn parse_access_key<'a>(prefix: &str, key: &'a str) -> Option<(i64, &'a str)> {
        let suffix = key.strip_prefix(prefix)?;
        let (user_id, session_uuid) = suffix.split_once(':')?;
        let user_id = user_id.parse::<i64>().ok()?;

        if session_uuid.is_empty() {
            return None;
        }
        Some((user_id, session_uuid))
    }
}

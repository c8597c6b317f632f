//! Token 编解码器
//!
//! 负责 access / refresh token 的签发与校验（HS256 类对称算法）。
//! 过期与无效是两类错误：过期返回 `TokenExpired`，调用方可以提示
//! "请重新登录"；签名不匹配、结构损坏、缺少 sub 声明返回 `InvalidToken`。

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::models::{RefreshPayload, TokenPayload, DEBUG_SESSION_UUID};
use crate::config::TokenConfig;
use crate::error::{Result, ServerError};

#[derive(Serialize)]
struct AccessClaims<'a> {
    sub: String,
    session_uuid: &'a str,
    exp: i64,
}

#[derive(Serialize)]
struct RefreshClaims {
    sub: String,
    exp: i64,
    /// 随机标识，保证同一秒签发的 refresh token 互不相同
    jti: String,
}

/// 解码用的宽松声明结构，sub / session_uuid 是否缺失由解码逻辑判定
#[derive(Deserialize)]
struct RawClaims {
    sub: Option<String>,
    session_uuid: Option<String>,
    exp: i64,
}

/// JWT 编解码服务
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    allow_debug_session: bool,
}

impl JwtCodec {
    /// 从 Token 配置创建编解码器
    pub fn new(config: &TokenConfig) -> Result<Self> {
        let algorithm: Algorithm = config
            .algorithm
            .parse()
            .map_err(|_| ServerError::Configuration(format!("不支持的签名算法: {}", config.algorithm)))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret_key.as_bytes()),
            algorithm,
            allow_debug_session: config.allow_debug_session,
        })
    }

    /// 签发 access token（包含 sub、session_uuid、exp）
    pub fn encode_access(
        &self,
        user_id: i64,
        session_uuid: &str,
        expire_at: DateTime<Utc>,
    ) -> Result<String> {
        let claims = AccessClaims {
            sub: user_id.to_string(),
            session_uuid,
            exp: expire_at.timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServerError::Internal(format!("Token 签发失败: {}", e)))
    }

    /// 签发 refresh token（sub、exp 加随机 jti）
    ///
    /// exp 只有秒级精度，没有 jti 时同一秒内给同一用户签发的两个
    /// refresh token 字节相同，缓存 key 会互相碰撞。
    pub fn encode_refresh(&self, user_id: i64, expire_at: DateTime<Utc>) -> Result<String> {
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            exp: expire_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| ServerError::Internal(format!("Token 签发失败: {}", e)))
    }

    /// 解码并校验 access token
    ///
    /// 过期边界精确到秒：exp 等于当前秒即视为过期。
    pub fn decode(&self, token: &str) -> Result<TokenPayload> {
        let raw = self.decode_raw(token, true)?;
        self.payload_from_raw(raw)
    }

    /// 解码 access token，容忍签名层面的过期
    ///
    /// 用于刷新（找回待退役的会话）和登出（尽力清理），
    /// 结构损坏或签名不匹配仍返回 `InvalidToken`。
    pub fn decode_allow_expired(&self, token: &str) -> Result<TokenPayload> {
        let raw = self.decode_raw(token, false)?;
        self.payload_from_raw(raw)
    }

    /// 解码并校验 refresh token（不含会话标识）
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshPayload> {
        let raw = self.decode_raw(token, true)?;
        let id = Self::subject_id(raw.sub)?;

        Ok(RefreshPayload {
            id,
            expire_time: raw.exp,
        })
    }

    fn decode_raw(&self, token: &str, validate_exp: bool) -> Result<RawClaims> {
        let mut validation = Validation::new(self.algorithm);
        // 默认 60 秒的容差会破坏过期边界语义
        validation.leeway = 0;
        validation.validate_exp = validate_exp;

        let data = decode::<RawClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ServerError::TokenExpired("Token 已过期".to_string())
                }
                _ => ServerError::InvalidToken("Token 无效".to_string()),
            }
        })?;

        // jsonwebtoken 对 exp == now 放行，这里收紧为过期
        if validate_exp && data.claims.exp <= Utc::now().timestamp() {
            return Err(ServerError::TokenExpired("Token 已过期".to_string()));
        }

        Ok(data.claims)
    }

    fn payload_from_raw(&self, raw: RawClaims) -> Result<TokenPayload> {
        let id = Self::subject_id(raw.sub)?;

        let session_uuid = match raw.session_uuid {
            Some(session_uuid) => session_uuid,
            // 工具类 token 可能没有会话声明，仅在配置放行时回退到 debug 会话
            None if self.allow_debug_session => DEBUG_SESSION_UUID.to_string(),
            None => return Err(ServerError::InvalidToken("Token 无效".to_string())),
        };

        Ok(TokenPayload {
            id,
            session_uuid,
            expire_time: raw.exp,
        })
    }

    fn subject_id(sub: Option<String>) -> Result<i64> {
        sub.as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| ServerError::InvalidToken("Token 无效".to_string()))
    }
}

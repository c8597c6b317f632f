//! 密码加密和验证模块
//!
//! 使用 bcrypt 算法进行密码加密（行业标准）

use bcrypt::{hash, verify, DEFAULT_COST};
use tracing::warn;

use crate::error::ServerError;

/// 密码加密成本（默认值 12，适合大多数场景）
pub const PASSWORD_COST: u32 = DEFAULT_COST;

/// 加密密码
///
/// 使用 bcrypt 算法将明文密码加密为哈希值（含随机盐）
pub fn hash_password(password: &str) -> Result<String, ServerError> {
    hash(password, PASSWORD_COST).map_err(|e| ServerError::Internal(format!("密码加密失败: {}", e)))
}

/// 验证密码
///
/// 比较明文密码和存储的哈希值是否匹配。
/// 密码不匹配返回 Ok(false)，哈希格式损坏才返回错误。
pub fn verify_password(password: &str, hashed: &str) -> Result<bool, ServerError> {
    verify(password, hashed).map_err(|e| ServerError::Internal(format!("密码验证失败: {}", e)))
}

/// 验证密码（存储哈希可能不存在）
///
/// 手机号注册的账号可以没有密码；哈希缺失或损坏一律视为验证失败，
/// 绝不抛出异常，调用方统一转换为通用的授权错误，避免用户枚举。
pub fn verify_optional_password(password: &str, hashed: Option<&str>) -> bool {
    match hashed {
        Some(h) => match verify_password(password, h) {
            Ok(matched) => matched,
            Err(e) => {
                warn!("存储的密码哈希无法解析，按验证失败处理: {}", e);
                false
            }
        },
        None => false,
    }
}

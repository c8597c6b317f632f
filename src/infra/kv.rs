//! 键值缓存能力接口（会话存储契约）
//!
//! 会话核心只依赖这个最小接口：带 TTL 的字符串读写、按前缀批量删除、
//! 以及用于在线会话展示的集合操作。所有删除操作幂等，删除不存在的
//! key 不是错误。

use async_trait::async_trait;

use crate::error::Result;

/// 带 TTL 的键值缓存接口
#[async_trait]
pub trait KvCache: Send + Sync {
    /// SETEX：写入并设置过期时间（秒）
    async fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<()>;

    /// GET：读取，不存在返回 None
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// DEL：删除单个 key
    async fn del(&self, key: &str) -> Result<()>;

    /// 按前缀扫描 key
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// 删除指定前缀的所有 key
    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        for key in self.keys(prefix).await? {
            self.del(&key).await?;
        }
        Ok(())
    }

    /// SADD：向集合添加成员
    async fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// SREM：从集合移除成员
    async fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// SMEMBERS：读取集合全部成员
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
}

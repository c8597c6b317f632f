// RedisClient - 会话存储的 Redis 实现
// 基于 bb8-redis 连接池

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bb8::Pool;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;

use crate::config::RedisConfig;
use crate::error::{Result, ServerError};
use crate::infra::kv::KvCache;

/// Redis 客户端（基于连接池）
pub struct RedisClient {
    pool: Arc<Pool<RedisConnectionManager>>,
    /// 单条 Redis 命令的执行超时
    command_timeout: Duration,
}

impl RedisClient {
    /// 创建新的 Redis 客户端（从 RedisConfig 配置）
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url.clone())
            .map_err(|e| ServerError::Cache(format!("Failed to create Redis manager: {}", e)))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(config.connection_timeout())
            .idle_timeout(Some(config.idle_timeout()))
            .build(manager)
            .await
            .map_err(|e| ServerError::Cache(format!("Failed to create Redis pool: {}", e)))?;

        let command_timeout = config.command_timeout();

        // 测试连接
        {
            let mut conn = pool
                .get()
                .await
                .map_err(|e| ServerError::Cache(format!("Failed to get Redis connection: {}", e)))?;

            let _: String = conn
                .ping()
                .await
                .map_err(|e| ServerError::Cache(format!("Redis ping failed: {}", e)))?;
        }

        tracing::info!(
            "✅ Redis 连接池已创建 (pool_size={}, min_idle={}, conn_timeout={}s, cmd_timeout={}ms)",
            config.pool_size,
            config.min_idle,
            config.connection_timeout_secs,
            config.command_timeout_ms,
        );

        Ok(Self {
            pool: Arc::new(pool),
            command_timeout,
        })
    }

    /// 从连接池获取连接
    async fn get_conn(&self) -> Result<bb8::PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| ServerError::Cache(format!("Failed to get Redis connection: {}", e)))
    }

    /// 执行带超时的 Redis 操作
    async fn with_timeout<F, T>(&self, op: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.command_timeout, op)
            .await
            .map_err(|_| {
                ServerError::Timeout(format!(
                    "Redis command timeout ({}ms)",
                    self.command_timeout.as_millis()
                ))
            })?
    }
}

#[async_trait]
impl KvCache for RedisClient {
    async fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<()> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            conn.set_ex::<_, _, ()>(key, value, seconds)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis SETEX failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            let result: Option<String> = conn
                .get(key)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis GET failed: {}", e)))?;
            Ok(result)
        })
        .await
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            conn.del::<_, ()>(key)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis DEL failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            let result: Vec<String> = conn
                .keys(format!("{}*", prefix))
                .await
                .map_err(|e| ServerError::Cache(format!("Redis KEYS failed: {}", e)))?;
            Ok(result)
        })
        .await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys = self.keys(prefix).await?;
        if keys.is_empty() {
            return Ok(());
        }

        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis DEL failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            conn.sadd::<_, _, ()>(key, member)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis SADD failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            conn.srem::<_, _, ()>(key, member)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis SREM failed: {}", e)))?;
            Ok(())
        })
        .await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        self.with_timeout(async {
            let mut conn = self.get_conn().await?;
            let result: Vec<String> = conn
                .smembers(key)
                .await
                .map_err(|e| ServerError::Cache(format!("Redis SMEMBERS failed: {}", e)))?;
            Ok(result)
        })
        .await
    }
}

// Infrastructure layer - 基础设施层
// 会话存储的键值缓存接口及其 Redis / 内存两个实现

pub mod kv;
pub mod memory;
pub mod redis;

// 重新导出主要类型
pub use kv::KvCache;
pub use memory::MemoryCache;
pub use redis::RedisClient;

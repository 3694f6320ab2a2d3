// 缓存模块
// Redis 键生成和缓存操作

pub mod keys;
pub mod operations;

pub use operations::{CachedSnapshotStore, RateLimitCacheOperations, RedisSnapshotCache, SnapshotCache};

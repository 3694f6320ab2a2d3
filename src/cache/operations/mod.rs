/// 缓存操作

pub mod rate_limit;
pub mod snapshot;

pub use rate_limit::RateLimitCacheOperations;
pub use snapshot::{CachedSnapshotStore, RedisSnapshotCache, SnapshotCache};

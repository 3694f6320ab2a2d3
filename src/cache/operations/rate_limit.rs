use std::sync::Arc;

use redis::{AsyncCommands, Client as RedisClient};

use crate::cache::keys::rate_limit_key;

/// 速率限制缓存操作
pub struct RateLimitCacheOperations;

impl RateLimitCacheOperations {
    /// 计数加一，窗口内第一次请求时设置过期时间
    pub async fn hit(
        redis: &Arc<RedisClient>,
        ip: &str,
        window_secs: u64,
    ) -> Result<u32, redis::RedisError> {
        let mut conn = redis.get_multiplexed_async_connection().await?;
        let key = rate_limit_key(ip);

        let count: u32 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn.expire(&key, window_secs as i64).await?;
        }

        Ok(count)
    }
}

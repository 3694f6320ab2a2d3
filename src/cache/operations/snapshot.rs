use std::sync::Arc;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, Script};
use uuid::Uuid;

use crate::cache::keys::{snapshot_field, snapshot_generation_key, snapshot_key};
use crate::models::{DataKind, DateRangeKey, MetricSnapshot};
use crate::store::{SnapshotStore, StoreError};

/// 代数键比缓存本身活得久，失效记录不会在读取途中消失
const GENERATION_TTL_SECS: i64 = 24 * 3600;

/// 代数未变时才写入 HASH 字段
const FILL_IF_CURRENT: &str = r#"
if (redis.call('GET', KEYS[2]) or '0') ~= ARGV[1] then
    return 0
end
redis.call('HSET', KEYS[1], ARGV[2], ARGV[3])
redis.call('EXPIRE', KEYS[1], ARGV[4])
return 1
"#;

/// 快照缓存后端
///
/// 每个键带一个失效代数。读取方在查底层存储之前先取代数，回填时代数
/// 已经变化就放弃写入，避免把失效前读到的旧数据写回缓存。
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn generation(&self, key: &str) -> Result<u64, StoreError>;

    /// 返回 false 表示期间发生过失效，没有写入
    async fn fill_if_current(
        &self,
        key: &str,
        field: &str,
        value: String,
        generation: u64,
    ) -> Result<bool, StoreError>;

    /// 删除键并推进代数
    async fn invalidate(&self, keys: &[String]) -> Result<(), StoreError>;
}

pub struct RedisSnapshotCache {
    redis_client: Arc<RedisClient>,
    ttl_secs: u64,
    fill_script: Script,
}

impl RedisSnapshotCache {
    pub fn new(redis_client: Arc<RedisClient>, ttl_secs: u64) -> Self {
        Self {
            redis_client,
            ttl_secs,
            fill_script: Script::new(FILL_IF_CURRENT),
        }
    }
}

#[async_trait]
impl SnapshotCache for RedisSnapshotCache {
    async fn get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.hget(key, field).await?;
        Ok(cached)
    }

    async fn generation(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let generation: Option<u64> = conn.get(snapshot_generation_key(key)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn fill_if_current(
        &self,
        key: &str,
        field: &str,
        value: String,
        generation: u64,
    ) -> Result<bool, StoreError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let filled: i64 = self
            .fill_script
            .key(key)
            .key(snapshot_generation_key(key))
            .arg(generation)
            .arg(field)
            .arg(value)
            .arg(self.ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(filled == 1)
    }

    async fn invalidate(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            let generation_key = snapshot_generation_key(key);
            pipe.incr(&generation_key, 1)
                .ignore()
                .expire(&generation_key, GENERATION_TTL_SECS)
                .ignore()
                .del(key)
                .ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

/// 快照读缓存
///
/// 读取先查缓存，未命中再查底层存储并按代数条件回填；写入和清除时推进
/// 代数并删除对应键。缓存出错只记录日志，直接使用底层存储。
pub struct CachedSnapshotStore {
    inner: Arc<dyn SnapshotStore>,
    cache: Arc<dyn SnapshotCache>,
}

impl CachedSnapshotStore {
    pub fn new(inner: Arc<dyn SnapshotStore>, cache: Arc<dyn SnapshotCache>) -> Self {
        Self { inner, cache }
    }

    async fn read_cached(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<Vec<MetricSnapshot>>, StoreError> {
        match self.cache.get(key, field).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn fill(
        &self,
        key: &str,
        field: &str,
        snapshots: &[MetricSnapshot],
        generation: u64,
    ) -> Result<bool, StoreError> {
        let json = serde_json::to_string(snapshots)?;
        self.cache
            .fill_if_current(key, field, json, generation)
            .await
    }

    async fn invalidate(&self, keys: Vec<String>) {
        if let Err(e) = self.cache.invalidate(&keys).await {
            tracing::warn!("Failed to invalidate snapshot cache: {}", e);
        }
    }
}

#[async_trait]
impl SnapshotStore for CachedSnapshotStore {
    async fn insert(&self, snapshot: &MetricSnapshot) -> Result<(), StoreError> {
        self.inner.insert(snapshot).await?;
        self.invalidate(vec![snapshot_key(snapshot.client_id, snapshot.data_kind)])
            .await;
        Ok(())
    }

    async fn recent(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
        limit: usize,
    ) -> Result<Vec<MetricSnapshot>, StoreError> {
        let key = snapshot_key(client_id, kind);
        let field = snapshot_field(range, limit);

        match self.read_cached(&key, &field).await {
            Ok(Some(snapshots)) => {
                tracing::debug!("Snapshot cache hit: {} {}", key, field);
                return Ok(snapshots);
            }
            Ok(None) => tracing::debug!("Snapshot cache miss: {} {}", key, field),
            Err(e) => tracing::debug!("Snapshot cache unavailable, reading database: {}", e),
        }

        // 代数必须在读底层存储之前取
        let generation = match self.cache.generation(&key).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::debug!("Snapshot cache generation unavailable: {}", e);
                None
            }
        };

        let snapshots = self.inner.recent(client_id, kind, range, limit).await?;

        if let Some(generation) = generation {
            match self.fill(&key, &field, &snapshots, generation).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(
                    "Snapshot cache invalidated during read, not filling: {}",
                    key
                ),
                Err(e) => tracing::debug!("Failed to populate snapshot cache: {}", e),
            }
        }
        Ok(snapshots)
    }

    async fn clear(&self, client_id: Uuid, kinds: &[DataKind]) -> Result<u64, StoreError> {
        let cleared = self.inner.clear(client_id, kinds).await?;
        self.invalidate(kinds.iter().map(|k| snapshot_key(client_id, *k)).collect())
            .await;
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::Utc;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use crate::models::{BacklinksPayload, SnapshotPayload};
    use crate::store::memory::MemorySnapshotStore;

    /// 进程内缓存后端，代数语义与 Redis 实现一致
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, HashMap<String, String>>>,
        generations: Mutex<HashMap<String, u64>>,
    }

    #[async_trait]
    impl SnapshotCache for MemoryCache {
        async fn get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
            Ok(self
                .entries
                .lock()
                .get(key)
                .and_then(|fields| fields.get(field).cloned()))
        }

        async fn generation(&self, key: &str) -> Result<u64, StoreError> {
            Ok(self.generations.lock().get(key).copied().unwrap_or(0))
        }

        async fn fill_if_current(
            &self,
            key: &str,
            field: &str,
            value: String,
            generation: u64,
        ) -> Result<bool, StoreError> {
            let generations = self.generations.lock();
            if generations.get(key).copied().unwrap_or(0) != generation {
                return Ok(false);
            }
            self.entries
                .lock()
                .entry(key.to_string())
                .or_default()
                .insert(field.to_string(), value);
            Ok(true)
        }

        async fn invalidate(&self, keys: &[String]) -> Result<(), StoreError> {
            let mut generations = self.generations.lock();
            let mut entries = self.entries.lock();
            for key in keys {
                *generations.entry(key.clone()).or_insert(0) += 1;
                entries.remove(key);
            }
            Ok(())
        }
    }

    /// 可以在读完数据、返回之前暂停的底层存储
    #[derive(Default)]
    struct PausingStore {
        inner: MemorySnapshotStore,
        reads: AtomicUsize,
        pause_next_read: AtomicBool,
        read_done: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SnapshotStore for PausingStore {
        async fn insert(&self, snapshot: &MetricSnapshot) -> Result<(), StoreError> {
            self.inner.insert(snapshot).await
        }

        async fn recent(
            &self,
            client_id: Uuid,
            kind: DataKind,
            range: &DateRangeKey,
            limit: usize,
        ) -> Result<Vec<MetricSnapshot>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let rows = self.inner.recent(client_id, kind, range, limit).await?;
            if self.pause_next_read.swap(false, Ordering::SeqCst) {
                self.read_done.notify_one();
                self.release.notified().await;
            }
            Ok(rows)
        }

        async fn clear(&self, client_id: Uuid, kinds: &[DataKind]) -> Result<u64, StoreError> {
            self.inner.clear(client_id, kinds).await
        }
    }

    fn backlinks(client_id: Uuid, total: f64) -> MetricSnapshot {
        MetricSnapshot::new(
            client_id,
            DateRangeKey::current(),
            Utc::now(),
            SnapshotPayload::Backlinks(BacklinksPayload {
                total_backlinks: Some(total),
                ..Default::default()
            }),
        )
    }

    fn cached_store() -> (Arc<CachedSnapshotStore>, Arc<PausingStore>) {
        let inner = Arc::new(PausingStore::default());
        let store = Arc::new(CachedSnapshotStore::new(
            inner.clone(),
            Arc::new(MemoryCache::default()),
        ));
        (store, inner)
    }

    /// 读到底层数据后暂停，等 `writer` 完成再让读取继续，返回读到的结果
    async fn read_across(
        store: &Arc<CachedSnapshotStore>,
        inner: &Arc<PausingStore>,
        client: Uuid,
        writer: impl std::future::Future<Output = ()>,
    ) -> Vec<MetricSnapshot> {
        inner.pause_next_read.store(true, Ordering::SeqCst);
        let reader = tokio::spawn({
            let store = store.clone();
            async move {
                store
                    .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
                    .await
            }
        });

        inner.read_done.notified().await;
        writer.await;
        inner.release.notify_one();
        reader.await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn repeated_reads_are_served_from_cache() {
        let (store, inner) = cached_store();
        let client = Uuid::new_v4();
        store.insert(&backlinks(client, 120.0)).await.unwrap();

        for _ in 0..3 {
            let rows = store
                .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
                .await
                .unwrap();
            assert_eq!(rows.len(), 1);
        }
        assert_eq!(inner.reads.load(Ordering::SeqCst), 1);

        store.insert(&backlinks(client, 150.0)).await.unwrap();
        let rows = store
            .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(inner.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn clear_during_read_does_not_restore_old_rows() {
        let (store, inner) = cached_store();
        let client = Uuid::new_v4();
        store.insert(&backlinks(client, 120.0)).await.unwrap();

        let stale = read_across(&store, &inner, client, async {
            store.clear(client, &[DataKind::Backlinks]).await.unwrap();
        })
        .await;
        assert_eq!(stale.len(), 1);

        let rows = store
            .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn insert_during_read_is_not_hidden_by_an_empty_fill() {
        let (store, inner) = cached_store();
        let client = Uuid::new_v4();

        let empty = read_across(&store, &inner, client, async {
            store.insert(&backlinks(client, 300.0)).await.unwrap();
        })
        .await;
        assert!(empty.is_empty());

        let rows = store
            .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn redis_fill_is_skipped_after_invalidation() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let cache = RedisSnapshotCache::new(Arc::new(RedisClient::open(url).unwrap()), 60);
        let key = snapshot_key(Uuid::new_v4(), DataKind::Backlinks);

        let generation = cache.generation(&key).await.unwrap();
        cache.invalidate(&[key.clone()]).await.unwrap();
        let filled = cache
            .fill_if_current(&key, "current:5", "[]".to_string(), generation)
            .await
            .unwrap();
        assert!(!filled);
        assert_eq!(cache.get(&key, "current:5").await.unwrap(), None);

        let generation = cache.generation(&key).await.unwrap();
        assert!(cache
            .fill_if_current(&key, "current:5", "[]".to_string(), generation)
            .await
            .unwrap());
        assert_eq!(
            cache.get(&key, "current:5").await.unwrap().as_deref(),
            Some("[]")
        );
        cache.invalidate(&[key]).await.unwrap();
    }
}

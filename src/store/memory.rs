//! 进程内存储实现，用于测试和不带数据库的本地运行

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{ConnectionStore, SnapshotStore, StampOutcome, StoreError, ThrottleStore};
use crate::models::{ConnectionRecord, DataKind, DateRangeKey, MetricSnapshot, ProviderKind};

#[derive(Debug, Default, Clone)]
struct ConnectionRow {
    credential: Option<String>,
    believed_valid: bool,
    last_validated_at: Option<DateTime<Utc>>,
    account_label: Option<String>,
}

#[derive(Default)]
pub struct MemoryConnectionStore {
    rows: Mutex<HashMap<(Uuid, ProviderKind), ConnectionRow>>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionStore for MemoryConnectionStore {
    async fn get(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ConnectionRecord, StoreError> {
        let rows = self.rows.lock();
        Ok(rows
            .get(&(client_id, provider))
            .map(|row| ConnectionRecord {
                has_credential: row.credential.is_some(),
                believed_valid: row.believed_valid,
                last_validated_at: row.last_validated_at,
                account_label: row.account_label.clone(),
            })
            .unwrap_or_default())
    }

    async fn credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<String>, StoreError> {
        let rows = self.rows.lock();
        Ok(rows
            .get(&(client_id, provider))
            .and_then(|row| row.credential.clone()))
    }

    async fn store_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        let row = rows.entry((client_id, provider)).or_default();
        row.credential = Some(credential.to_string());
        row.believed_valid = false;
        Ok(())
    }

    async fn set_valid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        account_label: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        match rows.get_mut(&(client_id, provider)) {
            Some(row) if row.credential.is_some() => {
                row.believed_valid = true;
                row.last_validated_at = Some(validated_at);
                if let Some(label) = account_label {
                    row.account_label = Some(label.to_string());
                }
                Ok(())
            }
            _ => Err(StoreError::MissingCredential {
                client_id,
                provider,
            }),
        }
    }

    async fn set_invalid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(&(client_id, provider)) {
            row.believed_valid = false;
            row.last_validated_at = Some(validated_at);
        }
        Ok(())
    }

    async fn clear_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.lock();
        if let Some(row) = rows.get_mut(&(client_id, provider)) {
            row.credential = None;
            row.believed_valid = false;
            row.account_label = None;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryThrottleStore {
    windows: Mutex<HashMap<(Uuid, DataKind), DateTime<Utc>>>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn try_stamp(
        &self,
        client_id: Uuid,
        kind: DataKind,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<StampOutcome, StoreError> {
        // 整个检查和写入都在同一把锁内完成
        let mut windows = self.windows.lock();
        match windows.get(&(client_id, kind)) {
            Some(&last) if now - last < cooldown => Ok(StampOutcome::Held {
                last_refresh_at: last,
            }),
            _ => {
                windows.insert((client_id, kind), now);
                Ok(StampOutcome::Acquired)
            }
        }
    }

    async fn last_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.windows.lock().get(&(client_id, kind)).copied())
    }
}

#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<Vec<MetricSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn insert(&self, snapshot: &MetricSnapshot) -> Result<(), StoreError> {
        self.snapshots.lock().push(snapshot.clone());
        Ok(())
    }

    async fn recent(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
        limit: usize,
    ) -> Result<Vec<MetricSnapshot>, StoreError> {
        let snapshots = self.snapshots.lock();
        let mut matching: Vec<MetricSnapshot> = snapshots
            .iter()
            .filter(|s| s.client_id == client_id && s.data_kind == kind && &s.range_key == range)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.fetched_at.cmp(&a.fetched_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn clear(&self, client_id: Uuid, kinds: &[DataKind]) -> Result<u64, StoreError> {
        let mut snapshots = self.snapshots.lock();
        let before = snapshots.len();
        snapshots.retain(|s| !(s.client_id == client_id && kinds.contains(&s.data_kind)));
        Ok((before - snapshots.len()) as u64)
    }
}

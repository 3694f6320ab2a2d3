use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::models::{DataKind, DateRangeKey, MetricSnapshot, SnapshotPayload};
use crate::store::{SnapshotStore, StoreError};

/// 指标快照，负载以 JSONB 保存
pub struct PgSnapshotStore {
    db: Arc<PgPool>,
}

impl PgSnapshotStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    snapshot_id: Uuid,
    client_id: Uuid,
    data_kind: String,
    range_key: String,
    fetched_at: DateTime<Utc>,
    payload: Json<SnapshotPayload>,
}

impl TryFrom<SnapshotRow> for MetricSnapshot {
    type Error = StoreError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let data_kind: DataKind = row.data_kind.parse().map_err(StoreError::Corrupt)?;
        let payload = row.payload.0;
        if payload.data_kind() != data_kind {
            return Err(StoreError::Corrupt(format!(
                "snapshot {} is tagged {} but holds {}",
                row.snapshot_id,
                data_kind,
                payload.data_kind()
            )));
        }

        Ok(MetricSnapshot {
            snapshot_id: row.snapshot_id,
            client_id: row.client_id,
            data_kind,
            range_key: DateRangeKey::from_stored(row.range_key),
            fetched_at: row.fetched_at,
            payload,
        })
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn insert(&self, snapshot: &MetricSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO metric_snapshots (snapshot_id, client_id, data_kind, range_key, fetched_at, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(snapshot.snapshot_id)
        .bind(snapshot.client_id)
        .bind(snapshot.data_kind.as_str())
        .bind(snapshot.range_key.as_str())
        .bind(snapshot.fetched_at)
        .bind(Json(&snapshot.payload))
        .execute(&*self.db)
        .await?;

        Ok(())
    }

    async fn recent(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
        limit: usize,
    ) -> Result<Vec<MetricSnapshot>, StoreError> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT snapshot_id, client_id, data_kind, range_key, fetched_at, payload
            FROM metric_snapshots
            WHERE client_id = $1 AND data_kind = $2 AND range_key = $3
            ORDER BY fetched_at DESC
            LIMIT $4
            "#,
        )
        .bind(client_id)
        .bind(kind.as_str())
        .bind(range.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.db)
        .await?;

        rows.into_iter().map(MetricSnapshot::try_from).collect()
    }

    async fn clear(&self, client_id: Uuid, kinds: &[DataKind]) -> Result<u64, StoreError> {
        let kinds: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
        let result =
            sqlx::query("DELETE FROM metric_snapshots WHERE client_id = $1 AND data_kind = ANY($2)")
                .bind(client_id)
                .bind(&kinds)
                .execute(&*self.db)
                .await?;

        Ok(result.rows_affected())
    }
}

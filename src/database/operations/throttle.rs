use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::DataKind;
use crate::store::{StampOutcome, StoreError, ThrottleStore};

/// 刷新窗口
pub struct PgThrottleStore {
    db: Arc<PgPool>,
}

impl PgThrottleStore {
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThrottleStore for PgThrottleStore {
    async fn try_stamp(
        &self,
        client_id: Uuid,
        kind: DataKind,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<StampOutcome, StoreError> {
        // 条件 upsert：只有窗口过期时才会写入并返回行，行锁保证并发时只有一个成功
        let stamped: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            INSERT INTO refresh_windows (client_id, data_kind, last_refresh_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (client_id, data_kind) DO UPDATE
            SET last_refresh_at = EXCLUDED.last_refresh_at
            WHERE refresh_windows.last_refresh_at <= $4
            RETURNING last_refresh_at
            "#,
        )
        .bind(client_id)
        .bind(kind.as_str())
        .bind(now)
        .bind(now - cooldown)
        .fetch_optional(&*self.db)
        .await?;

        if stamped.is_some() {
            return Ok(StampOutcome::Acquired);
        }

        match self.last_refresh(client_id, kind).await? {
            Some(last_refresh_at) => Ok(StampOutcome::Held { last_refresh_at }),
            None => Err(StoreError::Corrupt(format!(
                "refresh window for {}/{} vanished during stamp",
                client_id, kind
            ))),
        }
    }

    async fn last_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let last = sqlx::query_scalar(
            "SELECT last_refresh_at FROM refresh_windows WHERE client_id = $1 AND data_kind = $2",
        )
        .bind(client_id)
        .bind(kind.as_str())
        .fetch_optional(&*self.db)
        .await?;

        Ok(last)
    }
}

// 数据库模块
// 三类持久化状态的 Postgres 实现

pub mod operations;

use sqlx::{Executor, PgPool};

pub use operations::{PgConnectionStore, PgSnapshotStore, PgThrottleStore};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS provider_connections (
    client_id UUID NOT NULL,
    provider TEXT NOT NULL,
    credential TEXT,
    believed_valid BOOLEAN NOT NULL DEFAULT FALSE,
    last_validated_at TIMESTAMPTZ,
    account_label TEXT,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (client_id, provider),
    CHECK (NOT believed_valid OR credential IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS refresh_windows (
    client_id UUID NOT NULL,
    data_kind TEXT NOT NULL,
    last_refresh_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (client_id, data_kind)
);

CREATE TABLE IF NOT EXISTS metric_snapshots (
    snapshot_id UUID PRIMARY KEY,
    client_id UUID NOT NULL,
    data_kind TEXT NOT NULL,
    range_key TEXT NOT NULL,
    fetched_at TIMESTAMPTZ NOT NULL,
    payload JSONB NOT NULL
);

CREATE INDEX IF NOT EXISTS metric_snapshots_latest_idx
    ON metric_snapshots (client_id, data_kind, range_key, fetched_at DESC);
"#;

/// 启动时建表，已存在则跳过
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    pool.execute(SCHEMA).await?;
    tracing::info!("Database schema ready");
    Ok(())
}

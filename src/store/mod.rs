//! 持久化状态的存储接口
//!
//! 连接记录、刷新窗口、指标快照三类状态各有一个 trait。生产环境使用
//! `database::operations` 下的 Postgres 实现（快照外包一层 Redis 缓存），
//! 测试和本地演示使用 `memory` 下的进程内实现。

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{ConnectionRecord, DataKind, DateRangeKey, MetricSnapshot, ProviderKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cache error: {0}")]
    Cache(#[from] redis::RedisError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("connection {client_id}/{provider} has no stored credential")]
    MissingCredential {
        client_id: Uuid,
        provider: ProviderKind,
    },
    #[error("corrupt stored row: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// 从未写入过的连接返回默认（全 false）记录
    async fn get(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ConnectionRecord, StoreError>;

    async fn credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<String>, StoreError>;

    /// 保存凭证，连接状态重置为未验证
    async fn store_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<(), StoreError>;

    /// 没有凭证时返回 `StoreError::MissingCredential`
    async fn set_valid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        account_label: Option<&str>,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn set_invalid(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        validated_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn clear_credential(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError>;
}

/// 刷新窗口抢占结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampOutcome {
    /// 已在本次调用中写入新的刷新时间
    Acquired,
    /// 冷却期内，窗口仍被上一次刷新占用
    Held { last_refresh_at: DateTime<Utc> },
}

#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// 检查与写入必须是一个原子操作：同一个键并发调用时最多一个 `Acquired`
    async fn try_stamp(
        &self,
        client_id: Uuid,
        kind: DataKind,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<StampOutcome, StoreError>;

    async fn last_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn insert(&self, snapshot: &MetricSnapshot) -> Result<(), StoreError>;

    /// 最新的 `limit` 个快照，按 `fetched_at` 倒序
    async fn recent(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
        limit: usize,
    ) -> Result<Vec<MetricSnapshot>, StoreError>;

    /// 删除客户在这些类型下的全部快照，返回删除条数
    async fn clear(&self, client_id: Uuid, kinds: &[DataKind]) -> Result<u64, StoreError>;
}

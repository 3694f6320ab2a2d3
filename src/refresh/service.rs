use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::aggregator::DashboardAggregator;
use super::clock::Clock;
use super::executor::{RefreshExecutor, RefreshOutcome};
use super::orchestrator::{DashboardView, RecoveryOrchestrator};
use super::recovery::RecoveryMarks;
use super::registry::ConnectionRegistry;
use super::throttle::ThrottleGate;
use super::validator::{ConnectionValidator, ValidationOutcome};
use super::{RefreshPolicy, Stores};
use crate::models::{DataKind, DateRangeKey, ProviderKind};
use crate::provider::{ProviderError, Providers};
use crate::store::{SnapshotStore, StoreError};
use crate::utils::credential_fingerprint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForceRefreshResult {
    pub data_kind: DataKind,
    pub applied: bool,
    pub skipped_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<i64>,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStatus {
    pub provider: ProviderKind,
    pub connected: bool,
    pub account_label: Option<String>,
    pub last_validated_at: Option<DateTime<Utc>>,
    pub reconnect_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("{0} rejected the credential")]
    Rejected(ProviderKind),
    #[error("could not reach {provider}: {reason}")]
    Unavailable {
        provider: ProviderKind,
        reason: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 对外暴露的看板操作
pub struct DashboardService {
    registry: ConnectionRegistry,
    validator: ConnectionValidator,
    executor: RefreshExecutor,
    orchestrator: RecoveryOrchestrator,
    marks: RecoveryMarks,
    snapshots: Arc<dyn SnapshotStore>,
    default_range: DateRangeKey,
}

impl DashboardService {
    pub fn new(
        stores: Stores,
        providers: Providers,
        clock: Arc<dyn Clock>,
        policy: RefreshPolicy,
    ) -> Self {
        let registry = ConnectionRegistry::new(stores.connections, clock.clone());
        let gate = ThrottleGate::new(stores.throttle, clock.clone(), policy.cooldowns);
        let validator = ConnectionValidator::new(
            registry.clone(),
            stores.snapshots.clone(),
            providers.clone(),
            policy.provider_timeout,
        );
        let executor = RefreshExecutor::new(
            registry.clone(),
            gate,
            stores.snapshots.clone(),
            providers,
            validator.clone(),
            clock.clone(),
            policy.provider_timeout,
        );
        let aggregator = DashboardAggregator::new(
            registry.clone(),
            stores.snapshots.clone(),
            clock,
            policy.week_start,
        );
        let marks = RecoveryMarks::new();
        let orchestrator = RecoveryOrchestrator::new(
            aggregator,
            validator.clone(),
            executor.clone(),
            marks.clone(),
            policy.analytics_max_age,
        );

        Self {
            registry,
            validator,
            executor,
            orchestrator,
            marks,
            snapshots: stores.snapshots,
            default_range: policy.default_range,
        }
    }

    pub async fn get_dashboard_summary(
        &self,
        client_id: Uuid,
        range: Option<DateRangeKey>,
    ) -> Result<DashboardView, StoreError> {
        let range = range.unwrap_or_else(|| self.default_range.clone());
        self.orchestrator.ensure_fresh(client_id, &range).await
    }

    /// 用户手动刷新，同样要经过节流闸门
    pub async fn force_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: Option<DateRangeKey>,
    ) -> Result<ForceRefreshResult, StoreError> {
        let range = range.unwrap_or_else(|| self.default_range.clone());
        let outcome = self.executor.refresh(client_id, kind, &range).await?;
        let retry_after_secs = match &outcome {
            RefreshOutcome::Throttled { retry_after } => Some(retry_after.num_seconds()),
            _ => None,
        };

        Ok(ForceRefreshResult {
            data_kind: kind,
            applied: outcome.is_applied(),
            skipped_reason: outcome.skipped_reason(kind),
            retry_after_secs,
            last_refresh_at: self.last_refresh(client_id, kind).await?,
        })
    }

    pub async fn connection_status(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        validate: bool,
    ) -> Result<ConnectionStatus, StoreError> {
        let mut warning = None;
        if validate {
            if let ValidationOutcome::Unknown(reason) =
                self.validator.validate(client_id, provider).await?
            {
                warning = Some(format!("could not verify connection: {}", reason));
            }
        }

        let record = self.registry.get(client_id, provider).await?;
        Ok(ConnectionStatus {
            provider,
            connected: record.believed_valid,
            reconnect_required: record.needs_reconnect(),
            account_label: record.account_label,
            last_validated_at: record.last_validated_at,
            warning,
        })
    }

    /// 先探测凭证，通过后才保存
    pub async fn connect(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<ConnectionStatus, ConnectError> {
        let identity = match self.validator.probe(provider, credential).await {
            Ok(identity) => identity,
            Err(ProviderError::CredentialInvalid) => {
                tracing::info!(
                    "Connect {}/{} rejected (credential {})",
                    client_id,
                    provider,
                    credential_fingerprint(credential)
                );
                return Err(ConnectError::Rejected(provider));
            }
            Err(e) => {
                return Err(ConnectError::Unavailable {
                    provider,
                    reason: e.to_string(),
                });
            }
        };

        self.registry
            .store_credential(client_id, provider, credential)
            .await?;
        self.registry
            .set_valid(client_id, provider, identity.account_label.as_deref())
            .await?;
        self.marks.clear_client(client_id);
        tracing::info!(
            "Connected {}/{} as {:?} (credential {})",
            client_id,
            provider,
            identity.account_label,
            credential_fingerprint(credential)
        );

        Ok(self.connection_status(client_id, provider, false).await?)
    }

    /// 断开连接并清除依赖的缓存；重复调用无副作用
    pub async fn disconnect(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), StoreError> {
        self.registry.clear_credential(client_id, provider).await?;
        let cleared = self
            .snapshots
            .clear(client_id, provider.data_kinds())
            .await?;
        self.marks.clear_client(client_id);
        tracing::info!(
            "Disconnected {}/{}, cleared {} snapshots",
            client_id,
            provider,
            cleared
        );
        Ok(())
    }

    /// 最近一次刷新时间，供状态展示使用
    pub async fn last_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.executor.gate().last_refresh(client_id, kind).await
    }
}

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::registry::ConnectionRegistry;
use crate::models::{ProbeIdentity, ProviderKind};
use crate::provider::{ProviderError, Providers};
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
    /// 探测本身失败（网络、超时等），保留原有状态
    Unknown(String),
}

/// 连接校验器：用轻量探测确认"已连接"是否属实
#[derive(Clone)]
pub struct ConnectionValidator {
    registry: ConnectionRegistry,
    snapshots: Arc<dyn SnapshotStore>,
    providers: Providers,
    timeout: Duration,
}

impl ConnectionValidator {
    pub fn new(
        registry: ConnectionRegistry,
        snapshots: Arc<dyn SnapshotStore>,
        providers: Providers,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            snapshots,
            providers,
            timeout,
        }
    }

    pub async fn validate(
        &self,
        client_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ValidationOutcome, StoreError> {
        let Some(credential) = self.registry.credential(client_id, provider).await? else {
            return Ok(ValidationOutcome::Invalid);
        };

        match self.probe(provider, &credential).await {
            Ok(identity) => {
                match self
                    .registry
                    .set_valid(client_id, provider, identity.account_label.as_deref())
                    .await
                {
                    // 探测期间被断开
                    Err(StoreError::MissingCredential { .. }) => {
                        return Ok(ValidationOutcome::Invalid);
                    }
                    other => other?,
                }
                tracing::debug!("Connection confirmed: {}/{}", client_id, provider);
                Ok(ValidationOutcome::Valid)
            }
            Err(ProviderError::CredentialInvalid) => {
                let cleared = self.demote(client_id, provider).await?;
                tracing::info!(
                    "Connection {}/{} rejected by provider, demoted and cleared {} snapshots",
                    client_id,
                    provider,
                    cleared
                );
                Ok(ValidationOutcome::Invalid)
            }
            Err(e) => {
                tracing::warn!(
                    "Could not validate connection {}/{}: {}",
                    client_id,
                    provider,
                    e
                );
                Ok(ValidationOutcome::Unknown(e.to_string()))
            }
        }
    }

    /// 带超时的探测调用，连接前校验新凭证也走这里
    pub async fn probe(
        &self,
        provider: ProviderKind,
        credential: &str,
    ) -> Result<ProbeIdentity, ProviderError> {
        let client = self.providers.for_kind(provider);
        match tokio::time::timeout(self.timeout, client.probe(credential)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "probe timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// 标记连接失效并清除依赖它的缓存指标
    pub async fn demote(&self, client_id: Uuid, provider: ProviderKind) -> Result<u64, StoreError> {
        self.registry.set_invalid(client_id, provider).await?;
        self.snapshots.clear(client_id, provider.data_kinds()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::models::{BacklinksPayload, DataKind, DateRangeKey, MetricSnapshot, SnapshotPayload};
    use crate::provider::StubProvider;
    use crate::refresh::clock::ManualClock;
    use crate::store::memory::{MemoryConnectionStore, MemorySnapshotStore};

    struct Fixture {
        validator: ConnectionValidator,
        registry: ConnectionRegistry,
        snapshots: Arc<MemorySnapshotStore>,
        seo: Arc<StubProvider>,
    }

    fn fixture() -> Fixture {
        fixture_with_timeout(Duration::from_secs(5))
    }

    fn fixture_with_timeout(timeout: Duration) -> Fixture {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let registry = ConnectionRegistry::new(Arc::new(MemoryConnectionStore::new()), clock);
        let snapshots = Arc::new(MemorySnapshotStore::new());
        let seo = Arc::new(StubProvider::new(ProviderKind::Seo));
        let providers = Providers::new(
            Arc::new(StubProvider::new(ProviderKind::Analytics)),
            seo.clone(),
        );
        let validator = ConnectionValidator::new(
            registry.clone(),
            snapshots.clone(),
            providers,
            timeout,
        );
        Fixture {
            validator,
            registry,
            snapshots,
            seo,
        }
    }

    async fn connect(f: &Fixture, client: Uuid) {
        f.registry
            .store_credential(client, ProviderKind::Seo, "seo-key")
            .await
            .unwrap();
        f.registry
            .set_valid(client, ProviderKind::Seo, Some("old label"))
            .await
            .unwrap();
        f.snapshots
            .insert(&MetricSnapshot::new(
                client,
                DateRangeKey::current(),
                Utc::now(),
                SnapshotPayload::Backlinks(BacklinksPayload {
                    total_backlinks: Some(120.0),
                    ..Default::default()
                }),
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn no_credential_is_invalid_without_probe() {
        let f = fixture();
        let outcome = f
            .validator
            .validate(Uuid::new_v4(), ProviderKind::Seo)
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Invalid);
        assert_eq!(f.seo.probe_calls(), 0);
    }

    #[tokio::test]
    async fn rejected_probe_demotes_and_clears() {
        let f = fixture();
        let client = Uuid::new_v4();
        connect(&f, client).await;
        f.seo.probe_with(Err(ProviderError::CredentialInvalid));

        let outcome = f.validator.validate(client, ProviderKind::Seo).await.unwrap();

        assert_eq!(outcome, ValidationOutcome::Invalid);
        let record = f.registry.get(client, ProviderKind::Seo).await.unwrap();
        assert!(record.has_credential);
        assert!(!record.believed_valid);
        assert!(f.snapshots.is_empty());
    }

    #[tokio::test]
    async fn transient_probe_failure_keeps_state() {
        let f = fixture();
        let client = Uuid::new_v4();
        connect(&f, client).await;
        f.seo
            .probe_with(Err(ProviderError::Unavailable("503".to_string())));

        let outcome = f.validator.validate(client, ProviderKind::Seo).await.unwrap();

        assert!(matches!(outcome, ValidationOutcome::Unknown(_)));
        assert!(f.registry.get(client, ProviderKind::Seo).await.unwrap().believed_valid);
        assert_eq!(
            f.snapshots
                .recent(client, DataKind::Backlinks, &DateRangeKey::current(), 5)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn successful_probe_refreshes_label() {
        let f = fixture();
        let client = Uuid::new_v4();
        connect(&f, client).await;
        f.seo.probe_with(Ok(ProbeIdentity {
            account_label: Some("acme.example".to_string()),
        }));

        let outcome = f.validator.validate(client, ProviderKind::Seo).await.unwrap();

        assert_eq!(outcome, ValidationOutcome::Valid);
        let record = f.registry.get(client, ProviderKind::Seo).await.unwrap();
        assert_eq!(record.account_label.as_deref(), Some("acme.example"));
        assert!(record.last_validated_at.is_some());
    }

    #[tokio::test]
    async fn probe_timeout_is_unknown_and_keeps_state() {
        let f = fixture_with_timeout(Duration::from_millis(50));
        let client = Uuid::new_v4();
        connect(&f, client).await;
        f.seo.set_probe_delay(Duration::from_millis(500));

        let outcome = f.validator.validate(client, ProviderKind::Seo).await.unwrap();

        assert_eq!(
            outcome,
            ValidationOutcome::Unknown(
                "provider unavailable: probe timed out after 50ms".to_string()
            )
        );
        let record = f.registry.get(client, ProviderKind::Seo).await.unwrap();
        assert!(record.believed_valid);
        assert_eq!(record.account_label.as_deref(), Some("old label"));
        assert_eq!(f.snapshots.len(), 1);
    }
}

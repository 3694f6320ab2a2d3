use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::clock::Clock;
use super::registry::ConnectionRegistry;
use super::throttle::ThrottleGate;
use super::validator::ConnectionValidator;
use crate::models::{DataKind, DateRangeKey, MetricSnapshot};
use crate::provider::{FetchRequest, ProviderError, Providers};
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied { fetched_at: DateTime<Utc> },
    /// 连接不可用，没有调用提供方，也没有占用冷却窗口
    NotConnected,
    Throttled { retry_after: Duration },
    /// 已占用冷却窗口但调用失败
    Failed(ProviderError),
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, RefreshOutcome::Applied { .. })
    }

    /// 面向用户的跳过原因
    pub fn skipped_reason(&self, kind: DataKind) -> Option<String> {
        match self {
            RefreshOutcome::Applied { .. } => None,
            RefreshOutcome::NotConnected => Some(format!("{} is not connected", kind.provider())),
            RefreshOutcome::Throttled { retry_after } => Some(format!(
                "cached data in use; next refresh available in {}",
                humanize_wait(*retry_after)
            )),
            RefreshOutcome::Failed(e) => Some(e.to_string()),
        }
    }
}

/// 向上取整到小时，不足一小时按分钟
pub fn humanize_wait(wait: Duration) -> String {
    let secs = wait.num_seconds().max(1);
    if secs >= 3600 {
        let hours = (secs + 3599) / 3600;
        if hours == 1 {
            "1 hour".to_string()
        } else {
            format!("{} hours", hours)
        }
    } else {
        let minutes = (secs + 59) / 60;
        if minutes == 1 {
            "1 minute".to_string()
        } else {
            format!("{} minutes", minutes)
        }
    }
}

/// 所有提供方数据刷新的唯一入口：先过节流闸门，再调用提供方
#[derive(Clone)]
pub struct RefreshExecutor {
    registry: ConnectionRegistry,
    gate: ThrottleGate,
    snapshots: Arc<dyn SnapshotStore>,
    providers: Providers,
    validator: ConnectionValidator,
    clock: Arc<dyn Clock>,
    timeout: StdDuration,
}

impl RefreshExecutor {
    pub fn new(
        registry: ConnectionRegistry,
        gate: ThrottleGate,
        snapshots: Arc<dyn SnapshotStore>,
        providers: Providers,
        validator: ConnectionValidator,
        clock: Arc<dyn Clock>,
        timeout: StdDuration,
    ) -> Self {
        Self {
            registry,
            gate,
            snapshots,
            providers,
            validator,
            clock,
            timeout,
        }
    }

    pub fn gate(&self) -> &ThrottleGate {
        &self.gate
    }

    pub async fn refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
    ) -> Result<RefreshOutcome, StoreError> {
        let provider = kind.provider();
        if !self.registry.get(client_id, provider).await?.believed_valid {
            return Ok(RefreshOutcome::NotConnected);
        }
        let Some(credential) = self.registry.credential(client_id, provider).await? else {
            return Ok(RefreshOutcome::NotConnected);
        };

        let decision = self.gate.try_acquire(client_id, kind).await?;
        if !decision.allowed {
            return Ok(RefreshOutcome::Throttled {
                retry_after: decision
                    .retry_after
                    .unwrap_or_else(|| self.gate.cooldown(kind)),
            });
        }

        let request = FetchRequest {
            client_id,
            data_kind: kind,
            range: kind.storage_range(range),
            credential,
        };

        // 放行后的刷新在独立任务里跑完，调用方放弃请求也不会取消它
        let this = self.clone();
        match tokio::spawn(async move { this.run_admitted(request).await }).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Refresh task for {}/{} failed: {}", client_id, kind, e);
                Ok(RefreshOutcome::Failed(ProviderError::Unavailable(
                    "refresh task aborted".to_string(),
                )))
            }
        }
    }

    async fn run_admitted(&self, request: FetchRequest) -> Result<RefreshOutcome, StoreError> {
        let client_id = request.client_id;
        let kind = request.data_kind;
        let provider = self.providers.for_kind(kind.provider());

        let fetched = match tokio::time::timeout(self.timeout, provider.fetch(request.clone())).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Unavailable(format!(
                "request timed out after {}ms",
                self.timeout.as_millis()
            ))),
        };

        match fetched {
            Ok(payload) if payload.data_kind() != kind => {
                tracing::warn!(
                    "Provider returned {} for a {} refresh of {}",
                    payload.data_kind(),
                    kind,
                    client_id
                );
                Ok(RefreshOutcome::Failed(ProviderError::Unavailable(
                    "provider returned the wrong data kind".to_string(),
                )))
            }
            Ok(payload) => {
                let missing = payload.missing_required();
                if !missing.is_empty() {
                    // 不完整的数据不覆盖已有缓存
                    tracing::warn!(
                        "Partial {} data for {}: missing {:?}",
                        kind,
                        client_id,
                        missing
                    );
                    return Ok(RefreshOutcome::Failed(ProviderError::PartialData(
                        missing.join(", "),
                    )));
                }

                let snapshot =
                    MetricSnapshot::new(client_id, request.range, self.clock.now(), payload);
                self.snapshots.insert(&snapshot).await?;
                tracing::info!("Refreshed {} for {}", kind, client_id);
                Ok(RefreshOutcome::Applied {
                    fetched_at: snapshot.fetched_at,
                })
            }
            Err(ProviderError::CredentialInvalid) => {
                let cleared = self.validator.demote(client_id, kind.provider()).await?;
                tracing::info!(
                    "Credential for {}/{} rejected during refresh, cleared {} snapshots",
                    client_id,
                    kind.provider(),
                    cleared
                );
                Ok(RefreshOutcome::Failed(ProviderError::CredentialInvalid))
            }
            Err(e) => {
                tracing::warn!("Refresh of {} for {} failed: {}", kind, client_id, e);
                Ok(RefreshOutcome::Failed(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_round_up() {
        assert_eq!(humanize_wait(Duration::hours(47)), "47 hours");
        assert_eq!(
            humanize_wait(Duration::hours(46) + Duration::minutes(10)),
            "47 hours"
        );
        assert_eq!(humanize_wait(Duration::minutes(61)), "2 hours");
        assert_eq!(humanize_wait(Duration::minutes(1)), "1 minute");
        assert_eq!(humanize_wait(Duration::seconds(90)), "2 minutes");
        assert_eq!(humanize_wait(Duration::hours(1)), "1 hour");
    }

    #[test]
    fn skip_reasons_read_naturally() {
        let throttled = RefreshOutcome::Throttled {
            retry_after: Duration::hours(47),
        };
        assert_eq!(
            throttled.skipped_reason(DataKind::Backlinks).as_deref(),
            Some("cached data in use; next refresh available in 47 hours")
        );
        assert_eq!(
            RefreshOutcome::NotConnected
                .skipped_reason(DataKind::AnalyticsSummary)
                .as_deref(),
            Some("analytics is not connected")
        );
        assert_eq!(
            RefreshOutcome::Applied {
                fetched_at: Utc::now()
            }
            .skipped_reason(DataKind::PageMetrics),
            None
        );
    }
}

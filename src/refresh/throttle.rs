use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::clock::Clock;
use crate::models::DataKind;
use crate::store::{StampOutcome, StoreError, ThrottleStore};

/// 各数据类型的冷却时长
#[derive(Debug, Clone, Copy)]
pub struct Cooldowns {
    pub page_metrics: Duration,
    pub backlinks: Duration,
    /// 分析数据按新鲜度触发，这里只是保证同一时间最多一次在途刷新
    pub analytics_min_interval: Duration,
}

impl Default for Cooldowns {
    fn default() -> Self {
        Self {
            page_metrics: Duration::hours(48),
            backlinks: Duration::hours(48),
            analytics_min_interval: Duration::minutes(15),
        }
    }
}

impl Cooldowns {
    pub fn for_kind(&self, kind: DataKind) -> Duration {
        match kind {
            DataKind::PageMetrics => self.page_metrics,
            DataKind::Backlinks => self.backlinks,
            DataKind::AnalyticsSummary => self.analytics_min_interval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub retry_after: Option<Duration>,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn deny(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// 刷新节流闸门
///
/// 放行时立即写入刷新时间（而不是等刷新完成），同一个 (client, kind)
/// 的并发调用只有一个能通过。刷新失败也不回滚时间戳。
#[derive(Clone)]
pub struct ThrottleGate {
    store: Arc<dyn ThrottleStore>,
    clock: Arc<dyn Clock>,
    cooldowns: Cooldowns,
}

impl ThrottleGate {
    pub fn new(store: Arc<dyn ThrottleStore>, clock: Arc<dyn Clock>, cooldowns: Cooldowns) -> Self {
        Self {
            store,
            clock,
            cooldowns,
        }
    }

    pub fn cooldown(&self, kind: DataKind) -> Duration {
        self.cooldowns.for_kind(kind)
    }

    pub async fn try_acquire(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<GateDecision, StoreError> {
        let now = self.clock.now();
        let cooldown = self.cooldown(kind);

        match self.store.try_stamp(client_id, kind, now, cooldown).await? {
            StampOutcome::Acquired => {
                tracing::debug!("Refresh window acquired: {}/{}", client_id, kind);
                Ok(GateDecision::allow())
            }
            StampOutcome::Held { last_refresh_at } => {
                let remaining = cooldown - (now - last_refresh_at);
                // 时钟回拨时也保证返回正数
                let retry_after = remaining.max(Duration::seconds(1));
                tracing::debug!(
                    "Refresh window held: {}/{}, retry after {}s",
                    client_id,
                    kind,
                    retry_after.num_seconds()
                );
                Ok(GateDecision::deny(retry_after))
            }
        }
    }

    pub async fn last_refresh(
        &self,
        client_id: Uuid,
        kind: DataKind,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.store.last_refresh(client_id, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::clock::ManualClock;
    use crate::store::memory::MemoryThrottleStore;

    fn gate() -> (ThrottleGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = ThrottleGate::new(
            Arc::new(MemoryThrottleStore::new()),
            clock.clone(),
            Cooldowns::default(),
        );
        (gate, clock)
    }

    #[tokio::test]
    async fn backlinks_cooldown_timeline() {
        let (gate, clock) = gate();
        let client = Uuid::new_v4();

        let first = gate.try_acquire(client, DataKind::Backlinks).await.unwrap();
        assert!(first.allowed);
        assert_eq!(first.retry_after, None);

        clock.advance(Duration::hours(1));
        let second = gate.try_acquire(client, DataKind::Backlinks).await.unwrap();
        assert!(!second.allowed);
        assert_eq!(second.retry_after, Some(Duration::hours(47)));

        clock.advance(Duration::hours(48));
        let third = gate.try_acquire(client, DataKind::Backlinks).await.unwrap();
        assert!(third.allowed);
    }

    #[tokio::test]
    async fn immediate_reacquire_is_denied_with_positive_wait() {
        let (gate, _clock) = gate();
        let client = Uuid::new_v4();

        assert!(gate.try_acquire(client, DataKind::PageMetrics).await.unwrap().allowed);
        let denied = gate.try_acquire(client, DataKind::PageMetrics).await.unwrap();
        assert!(!denied.allowed);
        assert!(denied.retry_after.unwrap() > Duration::zero());
    }

    #[tokio::test]
    async fn analytics_uses_short_interval() {
        let (gate, clock) = gate();
        let client = Uuid::new_v4();

        assert!(gate.try_acquire(client, DataKind::AnalyticsSummary).await.unwrap().allowed);
        clock.advance(Duration::minutes(16));
        assert!(gate.try_acquire(client, DataKind::AnalyticsSummary).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn concurrent_acquire_admits_one() {
        let (gate, _clock) = gate();
        let client = Uuid::new_v4();

        let attempts = (0..16).map(|_| {
            let gate = gate.clone();
            tokio::spawn(async move { gate.try_acquire(client, DataKind::Backlinks).await })
        });
        let results = futures_util::future::join_all(attempts).await;
        let admitted = results
            .into_iter()
            .filter(|r| r.as_ref().unwrap().as_ref().unwrap().allowed)
            .count();
        assert_eq!(admitted, 1);
    }
}

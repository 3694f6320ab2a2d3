use chrono::Duration;
use futures_util::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use super::aggregator::DashboardAggregator;
use super::executor::{RefreshExecutor, RefreshOutcome};
use super::recovery::RecoveryMarks;
use super::validator::{ConnectionValidator, ValidationOutcome};
use crate::models::{DashboardSummary, DataKind, DateRangeKey, SectionState};
use crate::provider::ProviderError;
use crate::store::StoreError;

/// 每个 (client, range) 的最终状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessOutcome {
    FreshOnFirstTry,
    RecoveredOnce,
    /// 恢复已尝试过但数据仍不完整。并发请求中没抢到恢复标记的一方，
    /// 在另一方的恢复完成前看到的也是这个状态
    RecoveryExhaustedDegraded,
}

/// 返回给调用方的看板，附带非致命警告
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    #[serde(flatten)]
    pub summary: DashboardSummary,
    pub outcome: FreshnessOutcome,
    pub warnings: Vec<String>,
}

/// 自动恢复编排器
///
/// 连接声称有效但数据不完整时，先同步校验连接，再对每个 (client, range)
/// 最多做一次恢复刷新。恢复失败不会自动重试。
#[derive(Clone)]
pub struct RecoveryOrchestrator {
    aggregator: DashboardAggregator,
    validator: ConnectionValidator,
    executor: RefreshExecutor,
    marks: RecoveryMarks,
    analytics_max_age: Duration,
}

#[derive(Default)]
struct Pass {
    warnings: Vec<String>,
    changed: bool,
    demoted: bool,
    recovery_ran: bool,
}

impl RecoveryOrchestrator {
    pub fn new(
        aggregator: DashboardAggregator,
        validator: ConnectionValidator,
        executor: RefreshExecutor,
        marks: RecoveryMarks,
        analytics_max_age: Duration,
    ) -> Self {
        Self {
            aggregator,
            validator,
            executor,
            marks,
            analytics_max_age,
        }
    }

    pub async fn ensure_fresh(
        &self,
        client_id: Uuid,
        range: &DateRangeKey,
    ) -> Result<DashboardView, StoreError> {
        let mut summary = self.aggregator.compose(client_id, range).await?;
        let mut pass = Pass::default();

        // 先占标记再探测和恢复，并发的同键请求只有一个会继续
        if !summary.stale_providers().is_empty() && self.marks.try_mark(client_id, range) {
            self.confirm_connections(client_id, &summary, &mut pass)
                .await?;
            if pass.changed {
                summary = self.aggregator.compose(client_id, range).await?;
                pass.changed = false;
            }
            self.recover(client_id, range, &summary, &mut pass).await?;
        }

        self.refresh_aged_analytics(client_id, range, &summary, &mut pass)
            .await?;

        if pass.changed {
            summary = self.aggregator.compose(client_id, range).await?;
        }

        let still_stale = !summary.stale_kinds().is_empty();
        let outcome = if pass.recovery_ran && !still_stale && !pass.demoted {
            FreshnessOutcome::RecoveredOnce
        } else if pass.recovery_ran || still_stale || pass.demoted {
            FreshnessOutcome::RecoveryExhaustedDegraded
        } else {
            FreshnessOutcome::FreshOnFirstTry
        };

        Ok(DashboardView {
            summary,
            outcome,
            warnings: pass.warnings,
        })
    }

    /// 在信任"已连接"之前先做一次探测
    async fn confirm_connections(
        &self,
        client_id: Uuid,
        summary: &DashboardSummary,
        pass: &mut Pass,
    ) -> Result<(), StoreError> {
        for provider in summary.stale_providers() {
            match self.validator.validate(client_id, provider).await? {
                ValidationOutcome::Valid => {}
                ValidationOutcome::Invalid => {
                    pass.changed = true;
                    pass.demoted = true;
                    pass.warnings.push(format!(
                        "{} rejected the stored credential; reconnect required",
                        provider
                    ));
                }
                ValidationOutcome::Unknown(reason) => {
                    pass.warnings
                        .push(format!("could not verify {} connection: {}", provider, reason));
                }
            }
        }
        Ok(())
    }

    async fn recover(
        &self,
        client_id: Uuid,
        range: &DateRangeKey,
        summary: &DashboardSummary,
        pass: &mut Pass,
    ) -> Result<(), StoreError> {
        let stale = summary.stale_kinds();
        if stale.is_empty() {
            return Ok(());
        }
        pass.recovery_ran = true;
        tracing::info!(
            "Recovery refresh for {} ({}): {:?}",
            client_id,
            range,
            stale
        );

        let outcomes = join_all(
            stale
                .iter()
                .map(|kind| self.executor.refresh(client_id, *kind, range)),
        )
        .await;

        for (kind, outcome) in stale.into_iter().zip(outcomes) {
            self.absorb(kind, outcome?, pass);
        }
        Ok(())
    }

    /// 分析数据没有固定冷却，按快照年龄触发刷新
    async fn refresh_aged_analytics(
        &self,
        client_id: Uuid,
        range: &DateRangeKey,
        summary: &DashboardSummary,
        pass: &mut Pass,
    ) -> Result<(), StoreError> {
        let analytics = &summary.analytics;
        if analytics.state != SectionState::Ok {
            return Ok(());
        }
        let Some(fetched_at) = analytics.fetched_at else {
            return Ok(());
        };
        if summary.generated_at - fetched_at < self.analytics_max_age {
            return Ok(());
        }

        tracing::debug!(
            "Analytics snapshot for {} ({}) is older than {}h",
            client_id,
            range,
            self.analytics_max_age.num_hours()
        );
        let outcome = self
            .executor
            .refresh(client_id, DataKind::AnalyticsSummary, range)
            .await?;
        self.absorb(DataKind::AnalyticsSummary, outcome, pass);
        Ok(())
    }

    fn absorb(&self, kind: DataKind, outcome: RefreshOutcome, pass: &mut Pass) {
        match outcome {
            RefreshOutcome::Applied { .. } => pass.changed = true,
            // 冷却期内保持现状，不算错误
            RefreshOutcome::Throttled { .. } | RefreshOutcome::NotConnected => {}
            RefreshOutcome::Failed(ProviderError::CredentialInvalid) => {
                pass.changed = true;
                pass.demoted = true;
                pass.warnings.push(format!(
                    "{} rejected the stored credential; reconnect required",
                    kind.provider()
                ));
            }
            RefreshOutcome::Failed(e) => {
                pass.warnings.push(format!("{} refresh failed: {}", kind, e));
            }
        }
    }
}

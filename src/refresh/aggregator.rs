use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use uuid::Uuid;

use super::clock::Clock;
use super::registry::ConnectionRegistry;
use crate::models::{
    AnalyticsPayload, AnalyticsSection, AnalyticsTrend, BacklinksPayload, BacklinksView,
    ConnectionRecord, DailyTraffic, DashboardSummary, DataKind, DateRangeKey, Metric,
    MetricSnapshot, PageMetricsPayload, PageMetricsView, ProviderKind, SectionState, SeoSection,
    SnapshotPayload, TrendDelta, WeeklyBucket,
};
use crate::store::{SnapshotStore, StoreError};

/// 计算趋势只需要最新和上一份快照
const TREND_DEPTH: usize = 2;

/// 看板汇总器：只读缓存和连接登记表，从不调用提供方
#[derive(Clone)]
pub struct DashboardAggregator {
    registry: ConnectionRegistry,
    snapshots: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    week_start: Weekday,
}

impl DashboardAggregator {
    pub fn new(
        registry: ConnectionRegistry,
        snapshots: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        week_start: Weekday,
    ) -> Self {
        Self {
            registry,
            snapshots,
            clock,
            week_start,
        }
    }

    pub async fn compose(
        &self,
        client_id: Uuid,
        range: &DateRangeKey,
    ) -> Result<DashboardSummary, StoreError> {
        let analytics_record = self.registry.get(client_id, ProviderKind::Analytics).await?;
        let seo_record = self.registry.get(client_id, ProviderKind::Seo).await?;

        let analytics = if analytics_record.believed_valid {
            let history = self
                .history(client_id, DataKind::AnalyticsSummary, range)
                .await?;
            self.analytics_section(&analytics_record, &history)
        } else {
            self.analytics_section(&analytics_record, &[])
        };

        let seo = if seo_record.believed_valid {
            let pages = self.history(client_id, DataKind::PageMetrics, range).await?;
            let links = self.history(client_id, DataKind::Backlinks, range).await?;
            seo_section(&seo_record, &pages, &links)
        } else {
            seo_section(&seo_record, &[], &[])
        };

        Ok(DashboardSummary {
            client_id,
            range: range.clone(),
            generated_at: self.clock.now(),
            analytics,
            seo,
        })
    }

    async fn history(
        &self,
        client_id: Uuid,
        kind: DataKind,
        range: &DateRangeKey,
    ) -> Result<Vec<MetricSnapshot>, StoreError> {
        self.snapshots
            .recent(client_id, kind, &kind.storage_range(range), TREND_DEPTH)
            .await
    }

    fn analytics_section(
        &self,
        record: &ConnectionRecord,
        history: &[MetricSnapshot],
    ) -> AnalyticsSection {
        let latest = history.first().and_then(|s| analytics_payload(s).map(|p| (s, p)));
        let previous = history.get(1).and_then(analytics_payload);

        let mut section = AnalyticsSection {
            connected: record.believed_valid,
            account_label: record.account_label.clone(),
            state: SectionState::Ok,
            sessions: Metric::Unknown,
            users: Metric::Unknown,
            pageviews: Metric::Unknown,
            bounce_rate: Metric::Unknown,
            avg_session_duration: Metric::Unknown,
            trend: AnalyticsTrend::default(),
            weekly: Vec::new(),
            fetched_at: None,
        };

        if let Some((snapshot, payload)) = latest {
            section.sessions = Metric::from_source(payload.sessions);
            section.users = Metric::from_source(payload.users);
            section.pageviews = Metric::from_source(payload.pageviews);
            section.bounce_rate = Metric::from_source(payload.bounce_rate);
            section.avg_session_duration = Metric::from_source(payload.avg_session_duration);
            section.weekly = weekly_buckets(&payload.daily, self.week_start);
            section.fetched_at = Some(snapshot.fetched_at);

            if let Some(prev) = previous {
                section.trend = AnalyticsTrend {
                    sessions: TrendDelta::between(
                        section.sessions,
                        Metric::from_source(prev.sessions),
                    ),
                    users: TrendDelta::between(section.users, Metric::from_source(prev.users)),
                    pageviews: TrendDelta::between(
                        section.pageviews,
                        Metric::from_source(prev.pageviews),
                    ),
                };
            }
        }

        let incomplete = !section.sessions.is_known() || !section.users.is_known();
        section.state = section_state(record, incomplete);
        section
    }
}

fn seo_section(
    record: &ConnectionRecord,
    pages: &[MetricSnapshot],
    links: &[MetricSnapshot],
) -> SeoSection {
    let page = page_view(pages);
    let backlinks = backlinks_view(links);
    let incomplete = !page.domain_authority.is_known() || !backlinks.total.is_known();

    SeoSection {
        connected: record.believed_valid,
        account_label: record.account_label.clone(),
        state: section_state(record, incomplete),
        page,
        backlinks,
    }
}

fn page_view(history: &[MetricSnapshot]) -> PageMetricsView {
    let latest = history.first().and_then(|s| page_payload(s).map(|p| (s, p)));
    let Some((snapshot, payload)) = latest else {
        return PageMetricsView::default();
    };
    let domain_authority = Metric::from_source(payload.domain_authority);
    let previous_authority = history
        .get(1)
        .and_then(page_payload)
        .map(|p| Metric::from_source(p.domain_authority))
        .unwrap_or_default();

    PageMetricsView {
        domain_authority,
        page_authority: Metric::from_source(payload.page_authority),
        spam_score: Metric::from_source(payload.spam_score),
        linking_domains: Metric::from_source(payload.linking_domains),
        domain_authority_trend: TrendDelta::between(domain_authority, previous_authority),
        fetched_at: Some(snapshot.fetched_at),
    }
}

fn backlinks_view(history: &[MetricSnapshot]) -> BacklinksView {
    let latest = history.first().and_then(|s| backlinks_payload(s).map(|p| (s, p)));
    let Some((snapshot, payload)) = latest else {
        return BacklinksView::default();
    };
    let total = Metric::from_source(payload.total_backlinks);
    let new = Metric::from_source(payload.new_backlinks);
    let lost = Metric::from_source(payload.lost_backlinks);
    let previous_total = history
        .get(1)
        .and_then(backlinks_payload)
        .map(|p| Metric::from_source(p.total_backlinks))
        .unwrap_or_default();

    BacklinksView {
        total,
        referring_domains: Metric::from_source(payload.referring_domains),
        new,
        lost,
        net_change: new.minus(lost),
        total_trend: TrendDelta::between(total, previous_total),
        fetched_at: Some(snapshot.fetched_at),
    }
}

fn section_state(record: &ConnectionRecord, incomplete: bool) -> SectionState {
    if !record.has_credential {
        SectionState::NotConnected
    } else if !record.believed_valid {
        SectionState::ReconnectRequired
    } else if incomplete {
        SectionState::Incomplete
    } else {
        SectionState::Ok
    }
}

fn analytics_payload(snapshot: &MetricSnapshot) -> Option<&AnalyticsPayload> {
    match &snapshot.payload {
        SnapshotPayload::AnalyticsSummary(p) => Some(p),
        _ => None,
    }
}

fn page_payload(snapshot: &MetricSnapshot) -> Option<&PageMetricsPayload> {
    match &snapshot.payload {
        SnapshotPayload::PageMetrics(p) => Some(p),
        _ => None,
    }
}

fn backlinks_payload(snapshot: &MetricSnapshot) -> Option<&BacklinksPayload> {
    match &snapshot.payload {
        SnapshotPayload::Backlinks(p) => Some(p),
        _ => None,
    }
}

/// 日期所在自然周的第一天
pub fn week_start_of(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7
        - week_start.num_days_from_monday())
        % 7;
    date - Duration::days(i64::from(offset))
}

#[derive(Default)]
struct BucketSum {
    sessions: Option<f64>,
    users: Option<f64>,
    pageviews: Option<f64>,
}

fn add_known(total: &mut Option<f64>, value: Option<f64>) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        *total = Some(total.unwrap_or(0.0) + v);
    }
}

/// 把日数据按周汇总；一周内没有任何已知值时该周为未知
pub fn weekly_buckets(daily: &[DailyTraffic], week_start: Weekday) -> Vec<WeeklyBucket> {
    let mut buckets: BTreeMap<NaiveDate, BucketSum> = BTreeMap::new();
    for day in daily {
        let sum = buckets.entry(week_start_of(day.date, week_start)).or_default();
        add_known(&mut sum.sessions, day.sessions);
        add_known(&mut sum.users, day.users);
        add_known(&mut sum.pageviews, day.pageviews);
    }

    buckets
        .into_iter()
        .map(|(start, sum)| WeeklyBucket {
            week_start: start,
            sessions: Metric::from_source(sum.sessions),
            users: Metric::from_source(sum.users),
            pageviews: Metric::from_source(sum.pageviews),
        })
        .collect()
}

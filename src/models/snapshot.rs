use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kinds::{DataKind, DateRangeKey};

/// 提供方返回的一次指标快照，写入后不可修改，只会被更新的快照取代
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub snapshot_id: Uuid,
    pub client_id: Uuid,
    pub data_kind: DataKind,
    pub range_key: DateRangeKey,
    pub fetched_at: DateTime<Utc>,
    pub payload: SnapshotPayload,
}

impl MetricSnapshot {
    pub fn new(
        client_id: Uuid,
        range_key: DateRangeKey,
        fetched_at: DateTime<Utc>,
        payload: SnapshotPayload,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            client_id,
            data_kind: payload.data_kind(),
            range_key,
            fetched_at,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SnapshotPayload {
    AnalyticsSummary(AnalyticsPayload),
    PageMetrics(PageMetricsPayload),
    Backlinks(BacklinksPayload),
}

impl SnapshotPayload {
    pub fn data_kind(&self) -> DataKind {
        match self {
            SnapshotPayload::AnalyticsSummary(_) => DataKind::AnalyticsSummary,
            SnapshotPayload::PageMetrics(_) => DataKind::PageMetrics,
            SnapshotPayload::Backlinks(_) => DataKind::Backlinks,
        }
    }

    /// 缺失或非有限值的必需字段
    pub fn missing_required(&self) -> Vec<&'static str> {
        let required: Vec<(&'static str, Option<f64>)> = match self {
            SnapshotPayload::AnalyticsSummary(p) => {
                vec![("sessions", p.sessions), ("users", p.users)]
            }
            SnapshotPayload::PageMetrics(p) => vec![("domain_authority", p.domain_authority)],
            SnapshotPayload::Backlinks(p) => vec![("total_backlinks", p.total_backlinks)],
        };
        required
            .into_iter()
            .filter(|(_, value)| !value.is_some_and(f64::is_finite))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    pub sessions: Option<f64>,
    pub users: Option<f64>,
    pub pageviews: Option<f64>,
    pub bounce_rate: Option<f64>,
    pub avg_session_duration: Option<f64>,
    #[serde(default)]
    pub daily: Vec<DailyTraffic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTraffic {
    pub date: NaiveDate,
    pub sessions: Option<f64>,
    pub users: Option<f64>,
    pub pageviews: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetricsPayload {
    pub domain_authority: Option<f64>,
    pub page_authority: Option<f64>,
    pub spam_score: Option<f64>,
    pub linking_domains: Option<f64>,
    #[serde(default)]
    pub top_pages: Vec<PageRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRow {
    pub url: String,
    pub page_authority: Option<f64>,
    pub inbound_links: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BacklinksPayload {
    pub total_backlinks: Option<f64>,
    pub referring_domains: Option<f64>,
    pub new_backlinks: Option<f64>,
    pub lost_backlinks: Option<f64>,
    #[serde(default)]
    pub rows: Vec<BacklinkRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacklinkRow {
    pub source_url: String,
    pub target_url: String,
    pub domain_authority: Option<f64>,
    pub first_seen: Option<NaiveDate>,
}

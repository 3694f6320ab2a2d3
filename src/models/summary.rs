use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use super::kinds::{DataKind, DateRangeKey, ProviderKind};

/// 看板上的数值：`Unknown` 与 0 必须区分开
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Metric {
    Known(f64),
    #[default]
    Unknown,
}

impl Metric {
    /// 缺失或非有限的源数据一律视为未知
    pub fn from_source(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Metric::Known(v),
            _ => Metric::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Metric::Known(_))
    }

    pub fn minus(self, other: Metric) -> Metric {
        match (self, other) {
            (Metric::Known(a), Metric::Known(b)) => Metric::from_source(Some(a - b)),
            _ => Metric::Unknown,
        }
    }

    /// 相对 `base` 的百分比变化，基数为 0 或未知时为未知
    pub fn percent_change_from(self, base: Metric) -> Metric {
        match (self, base) {
            (Metric::Known(current), Metric::Known(base)) if base != 0.0 => {
                Metric::from_source(Some((current - base) / base * 100.0))
            }
            _ => Metric::Unknown,
        }
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Metric::Known(v) => serializer.serialize_f64(*v),
            Metric::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TrendDelta {
    pub delta: Metric,
    pub percent: Metric,
}

impl TrendDelta {
    pub fn between(current: Metric, previous: Metric) -> Self {
        Self {
            delta: current.minus(previous),
            percent: current.percent_change_from(previous),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionState {
    Ok,
    NotConnected,
    ReconnectRequired,
    Incomplete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub sessions: Metric,
    pub users: Metric,
    pub pageviews: Metric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsTrend {
    pub sessions: TrendDelta,
    pub users: TrendDelta,
    pub pageviews: TrendDelta,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSection {
    pub connected: bool,
    pub account_label: Option<String>,
    pub state: SectionState,
    pub sessions: Metric,
    pub users: Metric,
    pub pageviews: Metric,
    pub bounce_rate: Metric,
    pub avg_session_duration: Metric,
    pub trend: AnalyticsTrend,
    pub weekly: Vec<WeeklyBucket>,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetricsView {
    pub domain_authority: Metric,
    pub page_authority: Metric,
    pub spam_score: Metric,
    pub linking_domains: Metric,
    pub domain_authority_trend: TrendDelta,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacklinksView {
    pub total: Metric,
    pub referring_domains: Metric,
    pub new: Metric,
    pub lost: Metric,
    pub net_change: Metric,
    pub total_trend: TrendDelta,
    pub fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeoSection {
    pub connected: bool,
    pub account_label: Option<String>,
    pub state: SectionState,
    pub page: PageMetricsView,
    pub backlinks: BacklinksView,
}

/// 按需组装的看板视图，不落库
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub client_id: Uuid,
    pub range: DateRangeKey,
    pub generated_at: DateTime<Utc>,
    pub analytics: AnalyticsSection,
    pub seo: SeoSection,
}

impl DashboardSummary {
    /// 连接声称有效、但必需字段为空的数据类型
    pub fn stale_kinds(&self) -> Vec<DataKind> {
        let mut kinds = Vec::new();
        if self.analytics.connected
            && (!self.analytics.sessions.is_known() || !self.analytics.users.is_known())
        {
            kinds.push(DataKind::AnalyticsSummary);
        }
        if self.seo.connected {
            if !self.seo.page.domain_authority.is_known() {
                kinds.push(DataKind::PageMetrics);
            }
            if !self.seo.backlinks.total.is_known() {
                kinds.push(DataKind::Backlinks);
            }
        }
        kinds
    }

    pub fn stale_providers(&self) -> Vec<ProviderKind> {
        let stale = self.stale_kinds();
        ProviderKind::ALL
            .into_iter()
            .filter(|provider| stale.iter().any(|kind| kind.provider() == *provider))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_not_zero() {
        assert_eq!(Metric::from_source(Some(0.0)), Metric::Known(0.0));
        assert_eq!(Metric::from_source(None), Metric::Unknown);
        assert_eq!(Metric::from_source(Some(f64::INFINITY)), Metric::Unknown);
    }

    #[test]
    fn arithmetic_propagates_unknown() {
        let a = Metric::Known(120.0);
        let b = Metric::Known(100.0);
        assert_eq!(a.minus(b), Metric::Known(20.0));
        assert_eq!(a.percent_change_from(b), Metric::Known(20.0));
        assert_eq!(a.minus(Metric::Unknown), Metric::Unknown);
        assert_eq!(a.percent_change_from(Metric::Known(0.0)), Metric::Unknown);
    }

    #[test]
    fn metric_serializes_as_number_or_marker() {
        let json = serde_json::to_value(TrendDelta::between(Metric::Known(5.0), Metric::Unknown))
            .unwrap();
        assert_eq!(json["delta"], "unknown");
        assert_eq!(serde_json::to_value(Metric::Known(0.0)).unwrap(), 0.0);
    }
}

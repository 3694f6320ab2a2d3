mod connection;
mod kinds;
mod snapshot;
mod summary;

pub use connection::{ConnectionRecord, ProbeIdentity};
pub use kinds::{DataKind, DateRangeKey, ProviderKind};
pub use snapshot::{
    AnalyticsPayload, BacklinkRow, BacklinksPayload, DailyTraffic, MetricSnapshot, PageMetricsPayload,
    PageRow, SnapshotPayload,
};
pub use summary::{
    AnalyticsSection, AnalyticsTrend, BacklinksView, DashboardSummary, Metric, PageMetricsView,
    SectionState, SeoSection, TrendDelta, WeeklyBucket,
};

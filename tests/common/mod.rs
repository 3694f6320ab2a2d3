#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use dashboard_backend::models::{
    AnalyticsPayload, BacklinksPayload, DailyTraffic, PageMetricsPayload, ProviderKind,
    SnapshotPayload,
};
use dashboard_backend::provider::{Providers, StubProvider};
use dashboard_backend::refresh::{DashboardService, ManualClock, RefreshPolicy, Stores};
use dashboard_backend::store::memory::{
    MemoryConnectionStore, MemorySnapshotStore, MemoryThrottleStore,
};

pub struct Harness {
    pub service: Arc<DashboardService>,
    pub clock: Arc<ManualClock>,
    pub analytics: Arc<StubProvider>,
    pub seo: Arc<StubProvider>,
    pub snapshots: Arc<MemorySnapshotStore>,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

pub fn harness() -> Harness {
    harness_with(RefreshPolicy::default())
}

pub fn harness_with(policy: RefreshPolicy) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let analytics = Arc::new(StubProvider::new(ProviderKind::Analytics));
    let seo = Arc::new(StubProvider::new(ProviderKind::Seo));
    let snapshots = Arc::new(MemorySnapshotStore::new());

    let stores = Stores {
        connections: Arc::new(MemoryConnectionStore::new()),
        throttle: Arc::new(MemoryThrottleStore::new()),
        snapshots: snapshots.clone(),
    };
    let service = DashboardService::new(
        stores,
        Providers::new(analytics.clone(), seo.clone()),
        clock.clone(),
        policy,
    );

    Harness {
        service: Arc::new(service),
        clock,
        analytics,
        seo,
        snapshots,
    }
}

pub fn analytics_payload(sessions: f64) -> SnapshotPayload {
    let day = |d: u32, s: f64| DailyTraffic {
        date: NaiveDate::from_ymd_opt(2024, 3, d).unwrap(),
        sessions: Some(s),
        users: Some(s / 2.0),
        pageviews: Some(s * 3.0),
    };
    SnapshotPayload::AnalyticsSummary(AnalyticsPayload {
        sessions: Some(sessions),
        users: Some(sessions / 2.0),
        pageviews: Some(sessions * 3.0),
        bounce_rate: Some(41.5),
        avg_session_duration: Some(73.0),
        daily: vec![day(1, 100.0), day(2, 120.0), day(4, 80.0)],
    })
}

pub fn page_metrics_payload(domain_authority: f64) -> SnapshotPayload {
    SnapshotPayload::PageMetrics(PageMetricsPayload {
        domain_authority: Some(domain_authority),
        page_authority: Some(31.0),
        spam_score: Some(2.0),
        linking_domains: Some(140.0),
        top_pages: Vec::new(),
    })
}

pub fn backlinks_payload(total: f64) -> SnapshotPayload {
    SnapshotPayload::Backlinks(BacklinksPayload {
        total_backlinks: Some(total),
        referring_domains: Some(88.0),
        new_backlinks: Some(12.0),
        lost_backlinks: Some(5.0),
        rows: Vec::new(),
    })
}

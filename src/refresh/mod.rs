//! 看板数据对账与刷新编排
//!
//! 请求驱动：看板请求 -> 汇总器读取缓存 -> 数据缺失时编排器经节流闸门
//! 请求刷新 -> 调用提供方写入新快照 -> 重新汇总。

pub mod aggregator;
pub mod clock;
pub mod executor;
pub mod orchestrator;
pub mod recovery;
pub mod registry;
pub mod service;
pub mod throttle;
pub mod validator;

use std::sync::Arc;

use chrono::{Duration, Weekday};

use crate::config::Config;
use crate::models::DateRangeKey;
use crate::store::{ConnectionStore, SnapshotStore, ThrottleStore};

pub use clock::{Clock, ManualClock, SystemClock};
pub use executor::RefreshOutcome;
pub use orchestrator::{DashboardView, FreshnessOutcome};
pub use service::{ConnectError, ConnectionStatus, DashboardService, ForceRefreshResult};
pub use throttle::{Cooldowns, GateDecision};
pub use validator::ValidationOutcome;

/// 刷新相关的可调参数
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub cooldowns: Cooldowns,
    pub analytics_max_age: Duration,
    pub provider_timeout: std::time::Duration,
    pub week_start: Weekday,
    pub default_range: DateRangeKey,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            cooldowns: Cooldowns::default(),
            analytics_max_age: Duration::hours(12),
            provider_timeout: std::time::Duration::from_secs(20),
            week_start: Weekday::Mon,
            default_range: DateRangeKey::parse("30d").unwrap_or_else(|_| DateRangeKey::current()),
        }
    }
}

impl RefreshPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cooldowns: Cooldowns {
                page_metrics: config.page_metrics_cooldown,
                backlinks: config.backlinks_cooldown,
                analytics_min_interval: config.analytics_min_interval,
            },
            analytics_max_age: config.analytics_max_age,
            provider_timeout: config.provider_timeout(),
            week_start: config.week_start,
            default_range: config.default_range.clone(),
        }
    }
}

/// 三类持久化状态的存储
#[derive(Clone)]
pub struct Stores {
    pub connections: Arc<dyn ConnectionStore>,
    pub throttle: Arc<dyn ThrottleStore>,
    pub snapshots: Arc<dyn SnapshotStore>,
}


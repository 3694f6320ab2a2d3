use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 外部数据提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Analytics,
    Seo,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Analytics, ProviderKind::Seo];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Analytics => "analytics",
            ProviderKind::Seo => "seo",
        }
    }

    /// 该提供方负责的缓存数据类型
    pub fn data_kinds(&self) -> &'static [DataKind] {
        match self {
            ProviderKind::Analytics => &[DataKind::AnalyticsSummary],
            ProviderKind::Seo => &[DataKind::PageMetrics, DataKind::Backlinks],
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analytics" => Ok(ProviderKind::Analytics),
            "seo" => Ok(ProviderKind::Seo),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// 缓存指标的类别，每类有自己的冷却策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    PageMetrics,
    Backlinks,
    AnalyticsSummary,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [
        DataKind::PageMetrics,
        DataKind::Backlinks,
        DataKind::AnalyticsSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::PageMetrics => "page_metrics",
            DataKind::Backlinks => "backlinks",
            DataKind::AnalyticsSummary => "analytics_summary",
        }
    }

    pub fn provider(&self) -> ProviderKind {
        match self {
            DataKind::PageMetrics | DataKind::Backlinks => ProviderKind::Seo,
            DataKind::AnalyticsSummary => ProviderKind::Analytics,
        }
    }

    /// SEO 指标是时间点数据，不随请求的日期范围变化
    pub fn storage_range(&self, requested: &DateRangeKey) -> DateRangeKey {
        match self {
            DataKind::AnalyticsSummary => requested.clone(),
            DataKind::PageMetrics | DataKind::Backlinks => DateRangeKey::current(),
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown data kind: {}", s))
    }
}

const CURRENT_RANGE: &str = "current";
const MAX_RANGE_DAYS: u32 = 365;

/// 日期范围键，例如 `30d`；SEO 快照统一使用 `current`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DateRangeKey(String);

impl DateRangeKey {
    /// 解析外部传入的 `<n>d` 形式，1 <= n <= 365
    pub fn parse(raw: &str) -> Result<Self, String> {
        let raw = raw.trim();
        let days = raw
            .strip_suffix('d')
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| format!("invalid date range '{}', expected e.g. 30d", raw))?;
        if days == 0 || days > MAX_RANGE_DAYS {
            return Err(format!(
                "date range must be between 1d and {}d, got {}",
                MAX_RANGE_DAYS, raw
            ));
        }
        Ok(Self(format!("{}d", days)))
    }

    pub fn current() -> Self {
        Self(CURRENT_RANGE.to_string())
    }

    /// 从存储层读出的原始值，不做校验
    pub fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn days(&self) -> Option<u32> {
        self.0.strip_suffix('d').and_then(|n| n.parse().ok())
    }
}

impl fmt::Display for DateRangeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

use std::env;
use std::time::Duration as StdDuration;

use chrono::{Duration, Weekday};

use crate::models::DateRangeKey;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub analytics_api_url: String,
    pub seo_api_url: String,
    pub provider_timeout_secs: u64,
    pub page_metrics_cooldown: Duration,
    pub backlinks_cooldown: Duration,
    pub analytics_min_interval: Duration,
    pub analytics_max_age: Duration,
    pub snapshot_cache_ttl_secs: u64,
    pub default_range: DateRangeKey,
    pub week_start: Weekday,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Self::with_defaults(
            required("DATABASE_URL")?,
            required("REDIS_URL")?,
            required("JWT_SECRET")?,
        );

        Ok(Config {
            jwt_expiration_secs: duration_var("JWT_EXPIRATION")?
                .map(|d| d.num_seconds() as u64)
                .unwrap_or(defaults.jwt_expiration_secs),
            server_host: required("SERVER_HOST")?,
            server_port: parsed("SERVER_PORT", required("SERVER_PORT")?)?,
            api_base_uri: match optional("API_BASE_URI") {
                Some(raw) => base_uri(raw)?,
                None => defaults.api_base_uri,
            },
            rate_limit_window_secs: optional("RATE_LIMIT_WINDOW")
                .map(|v| parsed("RATE_LIMIT_WINDOW", v))
                .transpose()?
                .unwrap_or(defaults.rate_limit_window_secs),
            rate_limit_requests: optional("RATE_LIMIT_REQUESTS")
                .map(|v| parsed("RATE_LIMIT_REQUESTS", v))
                .transpose()?
                .unwrap_or(defaults.rate_limit_requests),
            analytics_api_url: optional("ANALYTICS_API_URL").unwrap_or(defaults.analytics_api_url),
            seo_api_url: optional("SEO_API_URL").unwrap_or(defaults.seo_api_url),
            provider_timeout_secs: optional("PROVIDER_TIMEOUT_SECS")
                .map(|v| parsed("PROVIDER_TIMEOUT_SECS", v))
                .transpose()?
                .unwrap_or(defaults.provider_timeout_secs),
            page_metrics_cooldown: duration_var("PAGE_METRICS_COOLDOWN")?
                .unwrap_or(defaults.page_metrics_cooldown),
            backlinks_cooldown: duration_var("BACKLINKS_COOLDOWN")?
                .unwrap_or(defaults.backlinks_cooldown),
            analytics_min_interval: duration_var("ANALYTICS_MIN_INTERVAL")?
                .unwrap_or(defaults.analytics_min_interval),
            analytics_max_age: duration_var("ANALYTICS_MAX_AGE")?
                .unwrap_or(defaults.analytics_max_age),
            snapshot_cache_ttl_secs: optional("SNAPSHOT_CACHE_TTL")
                .map(|v| parsed("SNAPSHOT_CACHE_TTL", v))
                .transpose()?
                .unwrap_or(defaults.snapshot_cache_ttl_secs),
            default_range: match optional("DEFAULT_DATE_RANGE") {
                Some(raw) => DateRangeKey::parse(&raw).map_err(|_| ConfigError::Invalid {
                    name: "DEFAULT_DATE_RANGE",
                    value: raw,
                })?,
                None => defaults.default_range,
            },
            week_start: optional("WEEK_START")
                .map(|v| parsed("WEEK_START", v))
                .transpose()?
                .unwrap_or(defaults.week_start),
            ..defaults
        })
    }

    /// 所有可调参数取默认值，测试和本地演示使用
    pub fn with_defaults(database_url: String, redis_url: String, jwt_secret: String) -> Self {
        Config {
            database_url,
            redis_url,
            jwt_secret,
            jwt_expiration_secs: 24 * 3600,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_base_uri: "/api/v1".to_string(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            analytics_api_url: "https://analytics.example.com".to_string(),
            seo_api_url: "https://seo.example.com".to_string(),
            provider_timeout_secs: 20,
            page_metrics_cooldown: Duration::hours(48),
            backlinks_cooldown: Duration::hours(48),
            analytics_min_interval: Duration::minutes(15),
            analytics_max_age: Duration::hours(12),
            snapshot_cache_ttl_secs: 600,
            default_range: DateRangeKey::parse("30d").unwrap_or_else(|_| DateRangeKey::current()),
            week_start: Weekday::Mon,
        }
    }

    pub fn provider_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.provider_timeout_secs)
    }

    pub fn jwt_expiration(&self) -> StdDuration {
        StdDuration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> StdDuration {
        StdDuration::from_secs(self.rate_limit_window_secs)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn duration_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    match optional(name) {
        Some(raw) => parse_duration(&raw)
            .map(Some)
            .ok_or(ConfigError::Invalid { name, value: raw }),
        None => Ok(None),
    }
}

/// 路由前缀必须以 `/` 开头且不能是根路径，末尾的 `/` 会被去掉
fn base_uri(raw: String) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if !trimmed.starts_with('/') || trimmed.contains(['*', '{', '}']) {
        return Err(ConfigError::Invalid {
            name: "API_BASE_URI",
            value: raw,
        });
    }
    Ok(trimmed.to_string())
}

/// 解析 `48h`、`15m`、`30s` 形式的时长
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (split, _) = raw.char_indices().last()?;
    let (number, unit) = raw.split_at(split);
    let n: i64 = number.parse().ok()?;
    if n < 0 {
        return None;
    }
    match unit {
        "h" => Some(Duration::hours(n)),
        "m" => Some(Duration::minutes(n)),
        "s" => Some(Duration::seconds(n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_parse_with_unit_suffix() {
        assert_eq!(parse_duration("48h"), Some(Duration::hours(48)));
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration(" 30s "), Some(Duration::seconds(30)));
        assert_eq!(parse_duration("48"), None);
        assert_eq!(parse_duration("h"), None);
        assert_eq!(parse_duration("-1h"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn base_uri_must_be_a_nested_prefix() {
        assert_eq!(base_uri("/api/v2".into()).unwrap(), "/api/v2");
        assert_eq!(base_uri(" /api/v2/ ".into()).unwrap(), "/api/v2");
        assert!(matches!(
            base_uri("/".into()),
            Err(ConfigError::Invalid {
                name: "API_BASE_URI",
                ..
            })
        ));
        assert!(base_uri("//".into()).is_err());
        assert!(base_uri("api/v1".into()).is_err());
        assert!(base_uri("/api/{version}".into()).is_err());
    }

    #[test]
    fn defaults_match_provider_quotas() {
        let config = Config::with_defaults(String::new(), String::new(), "secret".into());
        assert_eq!(config.page_metrics_cooldown, Duration::hours(48));
        assert_eq!(config.backlinks_cooldown, Duration::hours(48));
        assert_eq!(config.analytics_max_age, Duration::hours(12));
        assert_eq!(config.default_range.as_str(), "30d");
        assert_eq!(config.provider_timeout(), StdDuration::from_secs(20));
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::http::{endpoint, send_json};
use super::{FetchRequest, ProviderClient, ProviderError};
use crate::models::{
    AnalyticsPayload, DailyTraffic, DataKind, ProbeIdentity, ProviderKind, SnapshotPayload,
};

const DEFAULT_RANGE_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    #[serde(default)]
    totals: Option<SummaryTotals>,
    #[serde(default)]
    rows: Vec<SummaryRow>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryTotals {
    sessions: Option<f64>,
    users: Option<f64>,
    pageviews: Option<f64>,
    bounce_rate: Option<f64>,
    avg_session_duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryRow {
    date: NaiveDate,
    sessions: Option<f64>,
    users: Option<f64>,
    pageviews: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    account_name: Option<String>,
    property_name: Option<String>,
}

/// 网站分析服务的 HTTP 客户端
pub struct AnalyticsHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl AnalyticsHttpClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ProviderClient for AnalyticsHttpClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Analytics
    }

    async fn fetch(&self, request: FetchRequest) -> Result<SnapshotPayload, ProviderError> {
        if request.data_kind != DataKind::AnalyticsSummary {
            return Err(ProviderError::Unavailable(format!(
                "analytics provider cannot serve {}",
                request.data_kind
            )));
        }

        let days = request.range.days().unwrap_or(DEFAULT_RANGE_DAYS);
        let response: SummaryResponse = send_json(
            self.http
                .get(endpoint(&self.base_url, "/v1/reports/summary"))
                .bearer_auth(&request.credential)
                .query(&[
                    ("client_id", request.client_id.to_string()),
                    ("range_days", days.to_string()),
                ]),
        )
        .await?;

        Ok(SnapshotPayload::AnalyticsSummary(into_payload(response)))
    }

    async fn probe(&self, credential: &str) -> Result<ProbeIdentity, ProviderError> {
        let account: AccountResponse = send_json(
            self.http
                .get(endpoint(&self.base_url, "/v1/account"))
                .bearer_auth(credential),
        )
        .await?;

        Ok(ProbeIdentity {
            account_label: account.property_name.or(account.account_name),
        })
    }
}

fn into_payload(response: SummaryResponse) -> AnalyticsPayload {
    let totals = response.totals.unwrap_or_default();
    AnalyticsPayload {
        sessions: totals.sessions,
        users: totals.users,
        pageviews: totals.pageviews,
        bounce_rate: totals.bounce_rate,
        avg_session_duration: totals.avg_session_duration,
        daily: response
            .rows
            .into_iter()
            .map(|row| DailyTraffic {
                date: row.date,
                sessions: row.sessions,
                users: row.users,
                pageviews: row.pageviews,
            })
            .collect(),
    }
}

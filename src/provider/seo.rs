use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::http::{endpoint, send_json};
use super::{FetchRequest, ProviderClient, ProviderError};
use crate::models::{
    BacklinkRow, BacklinksPayload, DataKind, PageMetricsPayload, PageRow, ProbeIdentity,
    ProviderKind, SnapshotPayload,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UrlMetricsResponse {
    domain_authority: Option<f64>,
    page_authority: Option<f64>,
    spam_score: Option<f64>,
    root_domains_to_root_domain: Option<f64>,
    #[serde(default)]
    top_pages: Vec<TopPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopPage {
    page: String,
    page_authority: Option<f64>,
    external_pages_to_page: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BacklinksResponse {
    total: Option<f64>,
    referring_domains: Option<f64>,
    new_last_period: Option<f64>,
    lost_last_period: Option<f64>,
    #[serde(default)]
    results: Vec<BacklinkResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BacklinkResult {
    source: String,
    target: String,
    source_domain_authority: Option<f64>,
    first_seen: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatusResponse {
    account: Option<String>,
}

/// SEO 指标服务的 HTTP 客户端，页面指标和外链分两个接口
pub struct SeoHttpClient {
    http: reqwest::Client,
    base_url: String,
}

impl SeoHttpClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    async fn page_metrics(&self, request: &FetchRequest) -> Result<PageMetricsPayload, ProviderError> {
        let response: UrlMetricsResponse = send_json(
            self.http
                .get(endpoint(&self.base_url, "/v2/url_metrics"))
                .bearer_auth(&request.credential)
                .query(&[("client_id", request.client_id.to_string())]),
        )
        .await?;

        Ok(PageMetricsPayload {
            domain_authority: response.domain_authority,
            page_authority: response.page_authority,
            spam_score: response.spam_score,
            linking_domains: response.root_domains_to_root_domain,
            top_pages: response
                .top_pages
                .into_iter()
                .map(|p| PageRow {
                    url: p.page,
                    page_authority: p.page_authority,
                    inbound_links: p.external_pages_to_page,
                })
                .collect(),
        })
    }

    async fn backlinks(&self, request: &FetchRequest) -> Result<BacklinksPayload, ProviderError> {
        let response: BacklinksResponse = send_json(
            self.http
                .get(endpoint(&self.base_url, "/v2/links"))
                .bearer_auth(&request.credential)
                .query(&[("client_id", request.client_id.to_string())]),
        )
        .await?;

        Ok(BacklinksPayload {
            total_backlinks: response.total,
            referring_domains: response.referring_domains,
            new_backlinks: response.new_last_period,
            lost_backlinks: response.lost_last_period,
            rows: response
                .results
                .into_iter()
                .map(|r| BacklinkRow {
                    source_url: r.source,
                    target_url: r.target,
                    domain_authority: r.source_domain_authority,
                    first_seen: r.first_seen,
                })
                .collect(),
        })
    }
}

#[async_trait]
impl ProviderClient for SeoHttpClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Seo
    }

    async fn fetch(&self, request: FetchRequest) -> Result<SnapshotPayload, ProviderError> {
        match request.data_kind {
            DataKind::PageMetrics => Ok(SnapshotPayload::PageMetrics(
                self.page_metrics(&request).await?,
            )),
            DataKind::Backlinks => Ok(SnapshotPayload::Backlinks(
                self.backlinks(&request).await?,
            )),
            DataKind::AnalyticsSummary => Err(ProviderError::Unavailable(
                "seo provider cannot serve analytics_summary".to_string(),
            )),
        }
    }

    async fn probe(&self, credential: &str) -> Result<ProbeIdentity, ProviderError> {
        let status: IndexStatusResponse = send_json(
            self.http
                .get(endpoint(&self.base_url, "/v2/index_metadata"))
                .bearer_auth(credential),
        )
        .await?;

        Ok(ProbeIdentity {
            account_label: status.account,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlinks_response_parses_partial_rows() {
        let response: BacklinksResponse = serde_json::from_str(
            r#"{"total":null,"referringDomains":40,"results":[{"source":"https://a.example/x","target":"https://client.example/","sourceDomainAuthority":31}]}"#,
        )
        .unwrap();
        assert_eq!(response.total, None);
        assert_eq!(response.referring_domains, Some(40.0));
        assert_eq!(response.results[0].first_seen, None);
    }
}

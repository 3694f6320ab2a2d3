use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub range: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForceRefreshRequest {
    pub data_kind: String,
    pub range: Option<String>,
}

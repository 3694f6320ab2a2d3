use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};

use super::model::{DashboardQuery, ForceRefreshRequest};
use crate::AppState;
use crate::error::AppError;
use crate::models::DataKind;
use crate::result::ApiResponse;
use crate::refresh::{DashboardView, ForceRefreshResult};
use crate::routes::{parse_client_id, parse_range};
use crate::utils::{Claims, success_to_api_response};

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<ApiResponse<DashboardView>>, AppError> {
    let client_id = parse_client_id(&client_id)?;
    let range = parse_range(query.range.as_deref())?;

    let view = state
        .dashboard
        .get_dashboard_summary(client_id, range)
        .await?;
    Ok(success_to_api_response(view))
}

#[axum::debug_handler]
pub async fn force_refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(client_id): Path<String>,
    Json(req): Json<ForceRefreshRequest>,
) -> Result<Json<ApiResponse<ForceRefreshResult>>, AppError> {
    let client_id = parse_client_id(&client_id)?;
    let kind: DataKind = req.data_kind.parse().map_err(AppError::Validation)?;
    let range = parse_range(req.range.as_deref())?;

    tracing::info!("{} requested {} refresh for {}", claims.sub, kind, client_id);
    let result = state.dashboard.force_refresh(client_id, kind, range).await?;
    Ok(success_to_api_response(result))
}

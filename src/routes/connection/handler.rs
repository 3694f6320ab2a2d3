use axum::{
    Extension,
    extract::{Json, Path, Query, State},
};

use super::model::{ConnectRequest, StatusQuery};
use crate::AppState;
use crate::error::AppError;
use crate::models::ProviderKind;
use crate::refresh::ConnectionStatus;
use crate::result::ApiResponse;
use crate::routes::parse_client_id;
use crate::utils::{Claims, success_to_api_response};

fn parse_target(client_id: &str, provider: &str) -> Result<(uuid::Uuid, ProviderKind), AppError> {
    let client_id = parse_client_id(client_id)?;
    let provider = provider.parse().map_err(AppError::NotFound)?;
    Ok((client_id, provider))
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Path((client_id, provider)): Path<(String, String)>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<ApiResponse<ConnectionStatus>>, AppError> {
    let (client_id, provider) = parse_target(&client_id, &provider)?;
    let status = state
        .dashboard
        .connection_status(client_id, provider, query.validate)
        .await?;
    Ok(success_to_api_response(status))
}

#[axum::debug_handler]
pub async fn connect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((client_id, provider)): Path<(String, String)>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ApiResponse<ConnectionStatus>>, AppError> {
    let (client_id, provider) = parse_target(&client_id, &provider)?;
    let credential = req.credential.trim();
    if credential.is_empty() {
        return Err(AppError::Validation("credential must not be empty".into()));
    }

    tracing::info!("{} is connecting {} for {}", claims.sub, provider, client_id);
    let status = state
        .dashboard
        .connect(client_id, provider, credential)
        .await?;
    Ok(success_to_api_response(status))
}

#[axum::debug_handler]
pub async fn disconnect(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((client_id, provider)): Path<(String, String)>,
) -> Result<Json<ApiResponse<ConnectionStatus>>, AppError> {
    let (client_id, provider) = parse_target(&client_id, &provider)?;

    tracing::info!("{} is disconnecting {} for {}", claims.sub, provider, client_id);
    state.dashboard.disconnect(client_id, provider).await?;
    let status = state
        .dashboard
        .connection_status(client_id, provider, false)
        .await?;
    Ok(success_to_api_response(status))
}

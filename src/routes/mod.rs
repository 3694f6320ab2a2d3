pub mod connection;
pub mod dashboard;

use axum::{
    Json, Router,
    routing::get,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth_middleware;
use crate::models::DateRangeKey;
use crate::result::ApiResponse;
use crate::utils::success_to_api_response;
use crate::AppState;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

pub async fn health() -> Json<ApiResponse<Health>> {
    success_to_api_response(Health { status: "ok" })
}

/// 组装所有路由，除健康检查外都需要认证
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(
            "/clients/{client_id}/dashboard",
            get(dashboard::get_dashboard),
        )
        .route(
            "/clients/{client_id}/refresh",
            axum::routing::post(dashboard::force_refresh),
        )
        .route(
            "/clients/{client_id}/connections/{provider}",
            get(connection::get_status)
                .put(connection::connect)
                .delete(connection::disconnect),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let public_routes = Router::new().route("/health", get(health));

    Router::new()
        .nest(
            &state.config.api_base_uri,
            Router::new().merge(public_routes).merge(protected_routes),
        )
        .with_state(state)
}

pub(crate) fn parse_client_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("invalid client id: {}", raw)))
}

pub(crate) fn parse_range(raw: Option<&str>) -> Result<Option<DateRangeKey>, AppError> {
    raw.map(DateRangeKey::parse)
        .transpose()
        .map_err(AppError::Validation)
}

mod common;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use dashboard_backend::{
    AppState,
    config::Config,
    models::DataKind,
    provider::ProviderError,
    routes,
    utils::{error_codes, generate_token},
};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use common::{backlinks_payload, harness, Harness};

fn app() -> (Router, Harness, String) {
    let h = harness();
    let config = Config::with_defaults(String::new(), String::new(), "route-test-secret".into());
    let (token, _) = generate_token("account-manager", &config).unwrap();
    let state = AppState {
        config,
        dashboard: h.service.clone(),
    };
    (routes::router(state), h, token)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_is_public() {
    let (router, _h, _token) = app();
    let (status, body) = send(&router, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["resp_data"]["status"], "ok");
}

#[tokio::test]
async fn dashboard_requires_a_token() {
    let (router, _h, _token) = app();
    let uri = format!("/api/v1/clients/{}/dashboard", Uuid::new_v4());

    let (status, body) = send(&router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);

    let (status, _) = send(&router, Method::GET, &uri, Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dashboard_reports_unknown_for_unconnected_client() {
    let (router, _h, token) = app();
    let client = Uuid::new_v4();
    let uri = format!("/api/v1/clients/{}/dashboard?range=7d", client);

    let (status, body) = send(&router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["resp_data"];
    assert_eq!(data["client_id"], client.to_string());
    assert_eq!(data["range"], "7d");
    assert_eq!(data["outcome"], "fresh_on_first_try");
    assert_eq!(data["analytics"]["connected"], false);
    assert_eq!(data["analytics"]["state"], "not_connected");
    assert_eq!(data["analytics"]["sessions"], "unknown");
    assert_eq!(data["seo"]["backlinks"]["total"], "unknown");
}

#[tokio::test]
async fn invalid_inputs_use_the_error_envelope() {
    let (router, _h, token) = app();
    let client = Uuid::new_v4();

    let uri = format!("/api/v1/clients/{}/dashboard?range=400d", client);
    let (status, body) = send(&router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/v1/clients/not-a-uuid/dashboard",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);

    let uri = format!("/api/v1/clients/{}/connections/facebook", client);
    let (status, body) = send(&router, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], error_codes::NOT_FOUND);

    let uri = format!("/api/v1/clients/{}/refresh", client);
    let (status, body) = send(
        &router,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "data_kind": "rankings" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn connect_refresh_and_disconnect_over_http() {
    let (router, h, token) = app();
    let client = Uuid::new_v4();
    h.seo
        .respond_with(DataKind::Backlinks, Ok(backlinks_payload(2400.0)));

    let connection_uri = format!("/api/v1/clients/{}/connections/seo", client);
    let (status, body) = send(
        &router,
        Method::PUT,
        &connection_uri,
        Some(&token),
        Some(json!({ "credential": "moz-key" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["connected"], true);
    assert_eq!(body["resp_data"]["account_label"], "seo account");

    let refresh_uri = format!("/api/v1/clients/{}/refresh", client);
    let (status, body) = send(
        &router,
        Method::POST,
        &refresh_uri,
        Some(&token),
        Some(json!({ "data_kind": "backlinks" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["applied"], true);
    assert_eq!(body["resp_data"]["skipped_reason"], Value::Null);

    let (_, body) = send(
        &router,
        Method::POST,
        &refresh_uri,
        Some(&token),
        Some(json!({ "data_kind": "backlinks" })),
    )
    .await;
    assert_eq!(body["resp_data"]["applied"], false);
    assert_eq!(
        body["resp_data"]["skipped_reason"],
        "cached data in use; next refresh available in 48 hours"
    );
    assert_eq!(h.seo.fetch_calls(), 1);

    let (status, body) = send(&router, Method::DELETE, &connection_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp_data"]["connected"], false);
    assert!(h.snapshots.is_empty());
}

#[tokio::test]
async fn rejected_credential_maps_to_domain_code() {
    let (router, h, token) = app();
    h.analytics.probe_with(Err(ProviderError::CredentialInvalid));

    let uri = format!("/api/v1/clients/{}/connections/analytics", Uuid::new_v4());
    let (status, body) = send(
        &router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "credential": "expired-token" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], error_codes::CREDENTIAL_INVALID);
    assert_eq!(h.analytics.fetch_calls(), 0);

    h.analytics
        .probe_with(Err(ProviderError::Unavailable("connection reset".into())));
    let (status, body) = send(
        &router,
        Method::PUT,
        &uri,
        Some(&token),
        Some(json!({ "credential": "fresh-token" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], error_codes::PROVIDER_UNAVAILABLE);
}

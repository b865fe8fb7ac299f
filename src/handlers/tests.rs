//! # Tests for Handlers
//!
//! Handler-level tests that call handlers directly with hand-built state.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::LOCATION},
    response::Json,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{TimeZone, Utc};
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::handlers::integrations::ConnectionStatusResponse;
use crate::handlers::{AccountQuery, authorize, found, healthz, root};
use crate::models::ServiceInfo;
use crate::oauth::{
    ConnectionStatus, InMemoryTokenStore, OAuthConnector, ProviderClient, StaticMembership,
};
use crate::server::AppState;

fn app_state(db: DatabaseConnection) -> AppState {
    let config = Arc::new(AppConfig::default());
    let client = ProviderClient::new(std::time::Duration::from_secs(5)).unwrap();
    let connector = Arc::new(OAuthConnector::new(
        config.clone(),
        Arc::new(InMemoryTokenStore::new()),
        Arc::new(StaticMembership::new()),
        client,
    ));
    AppState {
        config,
        db,
        connector,
    }
}

#[tokio::test]
async fn test_root_handler_returns_expected_service_info() {
    let Json(service_info) = root().await;

    assert_eq!(service_info.service, "dealroom-oauth");
    assert_eq!(service_info.version, env!("CARGO_PKG_VERSION"));

    let json_value: Value = serde_json::to_value(&service_info).unwrap();
    assert!(json_value.get("service").is_some());
    assert!(json_value.get("version").is_some());
}

#[test]
fn test_service_info_default() {
    let service_info = ServiceInfo::default();
    assert_eq!(service_info.service, "dealroom-oauth");
}

#[tokio::test]
async fn test_healthz_reports_database_state() {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let Json(health) = healthz(State(app_state(db))).await.unwrap();
    assert_eq!(health.status, "ok");

    // Closing a clone closes the shared pool.
    let closed = Database::connect("sqlite::memory:").await.unwrap();
    closed.clone().close().await.unwrap();
    let err = healthz(State(app_state(closed))).await.unwrap_err();
    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(&*err.code, "SERVICE_UNAVAILABLE");
}

#[test]
fn test_account_query_validation() {
    let missing = AccountQuery::default().account_id().unwrap_err();
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(&*missing.code, "VALIDATION_FAILED");

    let invalid = AccountQuery {
        account_id: Some("acme".to_string()),
    }
    .account_id()
    .unwrap_err();
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let id = Uuid::new_v4();
    let valid = AccountQuery {
        account_id: Some(id.to_string()),
    };
    assert_eq!(valid.account_id().unwrap(), id);
}

#[test]
fn test_found_is_a_302_with_location() {
    let response = found("https://app.example/integrations?connected=slack");
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "https://app.example/integrations?connected=slack"
    );
}

#[test]
fn test_status_response_omits_absent_fields() {
    let disconnected: ConnectionStatusResponse = ConnectionStatus {
        is_connected: false,
        expires_at: None,
        needs_reauthorization: false,
    }
    .into();
    assert_eq!(
        serde_json::to_value(&disconnected).unwrap(),
        serde_json::json!({ "isConnected": false })
    );

    let flagged: ConnectionStatusResponse = ConnectionStatus {
        is_connected: false,
        expires_at: Some(Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0).unwrap()),
        needs_reauthorization: true,
    }
    .into();
    assert_eq!(
        serde_json::to_value(&flagged).unwrap(),
        serde_json::json!({
            "isConnected": false,
            "expires_at": "2026-01-05T12:00:00Z",
            "needsReauthorization": true
        })
    );
}

#[tokio::test]
async fn test_start_authorization_redirects_anonymous_users_to_sign_in() {
    let response = authorize::start_authorization(
        State(app_state(DatabaseConnection::default())),
        Path("hubspot".to_string()),
        Query(AccountQuery::default()),
        HeaderMap::new(),
        CookieJar::new(),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(LOCATION).unwrap(),
        "http://localhost:3000/sign-in"
    );
}

#[tokio::test]
async fn test_unknown_provider_is_not_found() {
    let err = authorize::start_authorization(
        State(app_state(DatabaseConnection::default())),
        Path("github".to_string()),
        Query(AccountQuery::default()),
        HeaderMap::new(),
        CookieJar::new(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.status, StatusCode::NOT_FOUND);
}

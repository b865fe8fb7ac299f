//! Status, identity and disconnect endpoints over a real SQLite-backed store.

use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, Response, StatusCode,
        header::{AUTHORIZATION, LOCATION},
    },
};
use chrono::{Duration, DurationRound, Utc};
use dealroom_oauth::{
    config::AppConfig,
    oauth::{ProviderKind, ProviderToken, TokenStore},
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;
use test_utils::*;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    session: Option<String>,
) -> Response<Body> {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        request = request.header(AUTHORIZATION, session);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn expired_hubspot_token() -> ProviderToken {
    let now = Utc::now().duration_trunc(Duration::seconds(1)).unwrap();
    ProviderToken {
        access_token: "stale-access".to_string(),
        refresh_token: Some("hub-refresh".to_string()),
        expires_at: Some(now - Duration::minutes(5)),
        scope: Some("oauth crm.objects.deals.read".to_string()),
        account_identity: Some("owner@acme.test".to_string()),
        needs_reauthorization: false,
    }
}

async fn app_with_member(
    server: Option<&MockServer>,
) -> (Router, AppConfig, sea_orm::DatabaseConnection, Uuid, Uuid) {
    let db = setup_test_db().await.unwrap();
    let config = test_config(server);
    let (account_id, user_id) = seed_member(&db).await.unwrap();
    let app = spawn_app(config.clone(), db.clone()).unwrap();
    (app, config, db, account_id, user_id)
}

#[tokio::test]
async fn status_without_token_is_disconnected() {
    let (app, config, _db, account_id, user_id) = app_with_member(None).await;

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/slack/status?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "isConnected": false }));
}

#[tokio::test]
async fn status_reports_expiry_of_stored_token() {
    let (app, config, db, account_id, user_id) = app_with_member(None).await;
    let expires_at = Utc::now().duration_trunc(Duration::seconds(1)).unwrap() + Duration::hours(1);
    let mut token = ProviderToken::new("live-access");
    token.expires_at = Some(expires_at);
    token_store(&db)
        .unwrap()
        .put(account_id, ProviderKind::Gmail, &token)
        .await
        .unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/gmail/status?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["isConnected"], true);
    assert_eq!(
        body["expires_at"].as_str().unwrap().parse::<chrono::DateTime<Utc>>().unwrap(),
        expires_at
    );
    assert!(body.get("needsReauthorization").is_none());
}

#[tokio::test]
async fn identity_refreshes_expired_token_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hubspot/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=hub-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hubspot/me"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": "owner@acme.test",
            "hub_id": 42
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, config, db, account_id, user_id) = app_with_member(Some(&server)).await;
    let store = token_store(&db).unwrap();
    store
        .put(account_id, ProviderKind::Hubspot, &expired_hubspot_token())
        .await
        .unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/identity?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["provider"], "hubspot");
    assert_eq!(body["identity"], "owner@acme.test");
    assert_eq!(body["profile"]["hub_id"], 42);

    let stored = store
        .get(account_id, ProviderKind::Hubspot)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token, "fresh-access");
    assert_eq!(stored.refresh_token.as_deref(), Some("hub-refresh"));
    assert!(stored.expires_at.unwrap() > Utc::now());

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/status?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;
    assert_eq!(body_json(response).await["isConnected"], true);
}

#[tokio::test]
async fn failed_refresh_requires_reauthorization() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hubspot/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "BAD_REFRESH_TOKEN",
            "message": "refresh token is invalid"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hubspot/me"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (app, config, db, account_id, user_id) = app_with_member(Some(&server)).await;
    token_store(&db)
        .unwrap()
        .put(account_id, ProviderKind::Hubspot, &expired_hubspot_token())
        .await
        .unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/identity?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "REAUTHORIZATION_REQUIRED");

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/status?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;
    let body = body_json(response).await;
    assert_eq!(body["isConnected"], false);
    assert_eq!(body["needsReauthorization"], true);
}

#[tokio::test]
async fn unconfigured_provider_fails_before_redirect() {
    let (app, config, _db, account_id, user_id) = app_with_member(None).await;

    let response = send(
        &app,
        Method::GET,
        &format!("/auth/salesforce?accountId={account_id}"),
        Some(bearer(&config, user_id)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(LOCATION).is_none());
    assert!(set_cookie(response.headers(), "salesforce_oauth_state").is_none());
    let body = body_json(response).await;
    assert_eq!(body["code"], "MISSING_CONFIGURATION");
    assert_eq!(body["details"]["key"], "DEALROOM_SALESFORCE_CLIENT_ID");
}

#[tokio::test]
async fn disconnect_removes_the_connection() {
    let (app, config, db, account_id, user_id) = app_with_member(None).await;
    token_store(&db)
        .unwrap()
        .put(account_id, ProviderKind::Slack, &ProviderToken::new("xoxb-token"))
        .await
        .unwrap();

    let uri = format!("/integrations/slack?accountId={account_id}");
    let response = send(&app, Method::DELETE, &uri, Some(bearer(&config, user_id))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, Method::DELETE, &uri, Some(bearer(&config, user_id))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn integrations_require_a_session() {
    let (app, _config, _db, account_id, _user_id) = app_with_member(None).await;

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/status?accountId={account_id}"),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn other_accounts_tokens_are_not_visible() {
    let (app, config, db, account_id, _user_id) = app_with_member(None).await;
    token_store(&db)
        .unwrap()
        .put(account_id, ProviderKind::Hubspot, &ProviderToken::new("acme-token"))
        .await
        .unwrap();
    let (other_account, outsider) = seed_member(&db).await.unwrap();

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/status?accountId={account_id}"),
        Some(bearer(&config, outsider)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::DELETE,
        &format!("/integrations/hubspot?accountId={account_id}"),
        Some(bearer(&config, outsider)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/hubspot/status?accountId={other_account}"),
        Some(bearer(&config, outsider)),
    )
    .await;
    assert_eq!(body_json(response).await, json!({ "isConnected": false }));
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (app, config, _db, _account_id, user_id) = app_with_member(None).await;

    let response = send(
        &app,
        Method::GET,
        "/integrations/hubspot/status",
        Some(bearer(&config, user_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        Method::GET,
        &format!("/integrations/github/status?accountId={}", Uuid::new_v4()),
        Some(bearer(&config, user_id)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_docs_are_served() {
    let (app, _config, _db, _account_id, _user_id) = app_with_member(None).await;

    let response = send(&app, Method::GET, "/healthz", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");

    let response = send(&app, Method::GET, "/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/integrations/{provider}/status"].is_object());
}

//! Test utilities for the OAuth connector integration tests.
//!
//! Provides an in-memory SQLite database with migrations applied, a config
//! pointing provider endpoints at a wiremock server, and helpers for seeding
//! accounts and driving the router.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Response, header::SET_COOKIE},
};
use dealroom_oauth::{
    auth::issue_session_token,
    config::{AppConfig, ProviderSettings},
    crypto::CryptoKey,
    models::account_member::MemberRole,
    oauth::ProviderKind,
    repositories::{AccountRepository, MembershipRepository, SeaOrmTokenStore},
    server::{AppState, create_app},
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;
use wiremock::MockServer;

pub const TEST_CRYPTO_KEY: [u8; 32] = [7u8; 32];
pub const TEST_SESSION_SECRET: &str = "integration-test-session-secret";

/// Sets up an in-memory SQLite database with all migrations applied.
///
/// Foreign keys stay enforced, so tokens and members need a seeded account.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Test configuration. When `server` is given, every provider's token and
/// identity endpoints point at it.
pub fn test_config(server: Option<&MockServer>) -> AppConfig {
    let mut config = AppConfig {
        profile: "test".to_string(),
        crypto_key: Some(TEST_CRYPTO_KEY.to_vec()),
        session_secret: Some(TEST_SESSION_SECRET.to_string()),
        frontend_origin: "https://app.dealroom.test".to_string(),
        public_base_url: "https://api.dealroom.test".to_string(),
        http_timeout_seconds: 5,
        ..AppConfig::default()
    };

    for provider in [
        ProviderKind::Hubspot,
        ProviderKind::Slack,
        ProviderKind::Gmail,
        ProviderKind::Zoho,
    ] {
        let mut settings = ProviderSettings::new(
            format!("{}-client-id", provider.slug()),
            format!("{}-client-secret", provider.slug()),
        );
        if let Some(server) = server {
            settings.token_url = Some(format!("{}/{}/token", server.uri(), provider.slug()));
            settings.identity_url = Some(format!("{}/{}/me", server.uri(), provider.slug()));
        }
        config.providers.insert(provider, settings);
    }

    config
}

/// A router wired to `db` exactly as `run_server` wires it.
pub fn spawn_app(config: AppConfig, db: DatabaseConnection) -> Result<Router> {
    let state = AppState::new(Arc::new(config), db)?;
    Ok(create_app(state))
}

/// Creates an account with one member and returns `(account_id, user_id)`.
pub async fn seed_member(db: &DatabaseConnection) -> Result<(Uuid, Uuid)> {
    let db = Arc::new(db.clone());
    let account = AccountRepository::new(db.clone()).create("Acme").await?;
    let user_id = Uuid::new_v4();
    MembershipRepository::new(db)
        .add_member(account.id, user_id, MemberRole::Admin)
        .await?;
    Ok((account.id, user_id))
}

pub fn membership_repo(db: &DatabaseConnection) -> MembershipRepository {
    MembershipRepository::new(Arc::new(db.clone()))
}

/// The same encrypted store the router uses.
pub fn token_store(db: &DatabaseConnection) -> Result<SeaOrmTokenStore> {
    let key = CryptoKey::new(TEST_CRYPTO_KEY.to_vec())?;
    Ok(SeaOrmTokenStore::new(Arc::new(db.clone()), key))
}

/// `Authorization` header value for `user_id`.
pub fn bearer(config: &AppConfig, user_id: Uuid) -> String {
    let token = issue_session_token(config, user_id, chrono::Duration::minutes(30))
        .expect("session token");
    format!("Bearer {token}")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Finds the `Set-Cookie` header for `name`.
pub fn set_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{name}=")))
}

/// Value portion of a `Set-Cookie` header (`name=value; ...`).
pub fn cookie_value(set_cookie: &str) -> &str {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value)
        .unwrap_or_default()
}

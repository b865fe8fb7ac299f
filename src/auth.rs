//! # Session Authentication
//!
//! Resolves the calling user from a session JWT presented either as
//! `Authorization: Bearer <jwt>` or in the `session` cookie. Tokens are HS256
//! signed with `DEALROOM_SESSION_SECRET`; `sub` is the user id.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::oauth::OAuthError;
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "session";

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: Uuid,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionUser {
    pub user_id: Uuid,
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        Arc::clone(&app_state.config)
    }
}

/// Validates the session token found in `headers`.
pub fn authenticate(config: &AppConfig, headers: &HeaderMap) -> Result<SessionUser, OAuthError> {
    let token = bearer_token(headers)
        .or_else(|| {
            CookieJar::from_headers(headers)
                .get(SESSION_COOKIE)
                .map(|cookie| cookie.value().to_string())
        })
        .filter(|token| !token.is_empty())
        .ok_or(OAuthError::Unauthenticated)?;

    let Some(secret) = config.session_secret() else {
        tracing::error!("Session secret is not configured; rejecting session");
        return Err(OAuthError::Unauthenticated);
    };

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<SessionClaims>(
        &token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|err| {
        tracing::debug!(error = %err, "Rejected session token");
        OAuthError::Unauthenticated
    })?;

    Ok(SessionUser {
        user_id: data.claims.sub,
    })
}

/// Signs a session token for `user_id`. Used by local tooling and tests;
/// production sessions are minted by the CRM.
pub fn issue_session_token(
    config: &AppConfig,
    user_id: Uuid,
    ttl: chrono::Duration,
) -> anyhow::Result<String> {
    let secret = config
        .session_secret()
        .ok_or_else(|| anyhow::anyhow!("session secret is not configured"))?;
    let exp = usize::try_from((Utc::now() + ttl).timestamp()).unwrap_or(0);
    let claims = SessionClaims {
        sub: user_id,
        exp,
        email: None,
    };
    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

impl<S> FromRequestParts<S> for SessionUser
where
    Arc<AppConfig>: FromRef<S>,
    S: Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<AppConfig>::from_ref(state);
        authenticate(&config, &parts.headers).map_err(ApiError::from)
    }
}

//! # Integration Handlers
//!
//! JSON endpoints the frontend uses to inspect and manage an account's
//! provider connections.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::SessionUser;
use crate::error::ApiError;
use crate::handlers::AccountQuery;
use crate::oauth::{ConnectionStatus, IdentityProfile, ProviderKind};
use crate::server::AppState;

/// Connection status for one provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConnectionStatusResponse {
    /// True when a token exists and has not expired
    #[serde(rename = "isConnected")]
    pub is_connected: bool,
    /// Expiry of the stored access token (RFC 3339)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Present (and true) when a refresh failed and the user must reconnect
    #[serde(
        rename = "needsReauthorization",
        skip_serializing_if = "Option::is_none"
    )]
    pub needs_reauthorization: Option<bool>,
}

impl From<ConnectionStatus> for ConnectionStatusResponse {
    fn from(status: ConnectionStatus) -> Self {
        Self {
            is_connected: status.is_connected,
            expires_at: status.expires_at,
            needs_reauthorization: status.needs_reauthorization.then_some(true),
        }
    }
}

/// Connection status
#[utoipa::path(
    get,
    path = "/integrations/{provider}/status",
    security(("bearer_auth" = [])),
    params(
        ("provider" = String, Path, description = "Provider slug"),
        AccountQuery
    ),
    responses(
        (status = 200, description = "Connection status", body = ConnectionStatusResponse),
        (status = 400, description = "Missing or invalid accountId", body = ApiError),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 403, description = "User is not a member of the account", body = ApiError),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn connection_status(
    State(state): State<AppState>,
    user: SessionUser,
    Path(provider): Path<String>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<ConnectionStatusResponse>, ApiError> {
    let provider: ProviderKind = provider.parse()?;
    let account_id = query.account_id()?;
    let status = state
        .connector
        .status(provider, account_id, user.user_id)
        .await?;
    Ok(Json(status.into()))
}

/// Provider identity
///
/// Calls the provider's identity endpoint with the account's token,
/// refreshing it first if it has expired.
#[utoipa::path(
    get,
    path = "/integrations/{provider}/identity",
    security(("bearer_auth" = [])),
    params(
        ("provider" = String, Path, description = "Provider slug"),
        AccountQuery
    ),
    responses(
        (status = 200, description = "Identity reported by the provider", body = IdentityProfile),
        (status = 401, description = "Missing session or reauthorization required", body = ApiError),
        (status = 403, description = "User is not a member of the account", body = ApiError),
        (status = 404, description = "No connection for this provider", body = ApiError),
        (status = 500, description = "Provider error", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn connection_identity(
    State(state): State<AppState>,
    user: SessionUser,
    Path(provider): Path<String>,
    Query(query): Query<AccountQuery>,
) -> Result<Json<IdentityProfile>, ApiError> {
    let provider: ProviderKind = provider.parse()?;
    let account_id = query.account_id()?;
    let profile = state
        .connector
        .identity(provider, account_id, user.user_id)
        .await?;
    Ok(Json(profile))
}

/// Disconnect a provider
#[utoipa::path(
    delete,
    path = "/integrations/{provider}",
    security(("bearer_auth" = [])),
    params(
        ("provider" = String, Path, description = "Provider slug"),
        AccountQuery
    ),
    responses(
        (status = 204, description = "Connection removed"),
        (status = 401, description = "Missing or invalid session", body = ApiError),
        (status = 403, description = "User is not a member of the account", body = ApiError),
        (status = 404, description = "No connection for this provider", body = ApiError)
    ),
    tag = "integrations"
)]
pub async fn disconnect(
    State(state): State<AppState>,
    user: SessionUser,
    Path(provider): Path<String>,
    Query(query): Query<AccountQuery>,
) -> Result<StatusCode, ApiError> {
    let provider: ProviderKind = provider.parse()?;
    let account_id = query.account_id()?;
    state
        .connector
        .disconnect(provider, account_id, user.user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

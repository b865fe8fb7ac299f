//! # Authorization Handlers
//!
//! Browser-facing endpoints: start the provider consent flow and receive the
//! provider's callback. Both answer with redirects rather than JSON, except
//! for initiation failures that indicate a server-side problem.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use metrics::counter;

use crate::auth::authenticate;
use crate::error::ApiError;
use crate::handlers::{AccountQuery, found};
use crate::oauth::{
    CallbackParams, OAuthError, ProviderKind,
    state::{build_state_cookie, clear_state_cookie, state_cookie_name},
};
use crate::server::AppState;

/// Start OAuth flow for a provider
///
/// Redirects the browser to the provider's consent page and sets the
/// `{provider}_oauth_state` cookie. Unauthenticated callers are sent to the
/// sign-in page.
#[utoipa::path(
    get,
    path = "/auth/{provider}",
    params(
        ("provider" = String, Path, description = "Provider slug (gmail, hubspot, salesforce, zoho, pipedrive, slack)"),
        AccountQuery
    ),
    responses(
        (status = 302, description = "Redirect to the provider consent page, or to sign-in when unauthenticated"),
        (status = 400, description = "Missing or invalid accountId", body = ApiError),
        (status = 403, description = "User is not a member of the account", body = ApiError),
        (status = 404, description = "Unknown provider", body = ApiError),
        (status = 500, description = "Provider is not configured", body = ApiError)
    ),
    tag = "authorization"
)]
pub async fn start_authorization(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<AccountQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let provider: ProviderKind = provider.parse()?;

    let user = match authenticate(&state.config, &headers) {
        Ok(user) => user,
        Err(_) => return Ok(found(&state.config.frontend_url("/sign-in"))),
    };
    let account_id = query.account_id()?;

    let request = state
        .connector
        .begin_authorization(provider, account_id, user.user_id)
        .await?;

    let cookie = build_state_cookie(
        provider,
        &request.nonce,
        state.config.state_ttl_seconds,
        state.config.secure_cookies(),
    );
    Ok((jar.add(cookie), found(&request.url)).into_response())
}

/// OAuth callback
///
/// Verifies the state cookie, exchanges the code and redirects back to the
/// frontend integrations page with either `connected` or `error` set. The
/// state cookie is cleared on every path.
#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    params(
        ("provider" = String, Path, description = "Provider slug"),
        CallbackParams
    ),
    responses(
        (status = 302, description = "Redirect to the frontend integrations page"),
        (status = 404, description = "Unknown provider", body = ApiError)
    ),
    tag = "authorization"
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let provider: ProviderKind = provider.parse()?;

    let cookie_nonce = jar
        .get(&state_cookie_name(provider))
        .map(|cookie| cookie.value().to_string());
    let jar = jar.add(clear_state_cookie(provider, state.config.secure_cookies()));

    let outcome = match authenticate(&state.config, &headers) {
        Ok(user) => {
            state
                .connector
                .complete_authorization(provider, &params, cookie_nonce.as_deref(), user.user_id)
                .await
        }
        Err(err) => Err(err),
    };

    let outcome_label = match &outcome {
        Ok(_) => "success",
        Err(err) => err.redirect_reason(),
    };
    counter!(
        "oauth_callback_total",
        "provider" => provider.slug(),
        "outcome" => outcome_label
    )
    .increment(1);

    let location = match outcome {
        Ok(_) => state
            .config
            .frontend_url(&format!("/integrations?connected={}", provider.slug())),
        Err(OAuthError::Unauthenticated) => state.config.frontend_url("/sign-in"),
        Err(err) => {
            match &err {
                OAuthError::Storage(_) | OAuthError::Crypto(_) | OAuthError::MissingConfiguration { .. } => {
                    tracing::error!(provider = %provider, error = %err, "OAuth callback failed");
                }
                _ => {
                    tracing::warn!(provider = %provider, error = %err, "OAuth callback rejected");
                }
            }
            state.config.frontend_url(&format!(
                "/integrations?error={}&provider={}",
                err.redirect_reason(),
                provider.slug()
            ))
        }
    };

    Ok((jar, found(&location)).into_response())
}

//! Anti-CSRF state handling for the authorization round trip.
//!
//! The `state` parameter sent to the provider is `<account_id>:<nonce>`; the
//! nonce is also set in an HttpOnly cookie scoped to the provider and compared
//! in constant time when the callback arrives.

use axum_extra::extract::cookie::{Cookie, SameSite};
use rand::Rng;
use subtle::ConstantTimeEq;
use url::Url;
use uuid::Uuid;

use super::{OAuthError, ProviderKind};

const NONCE_BYTES: usize = 32;
const MAX_AUTHORIZE_URL_LEN: usize = 2048;

/// Account and nonce carried through the provider in the `state` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedState {
    pub account_id: Uuid,
    pub nonce: String,
}

/// Generate a cryptographically secure random nonce (32 bytes, base64url).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill(&mut bytes);
    base64_url::encode(&bytes)
}

pub fn encode_state(account_id: Uuid, nonce: &str) -> String {
    format!("{}:{}", account_id, nonce)
}

/// Splits `state` on the first `:`.
pub fn parse_state(state: &str) -> Result<ParsedState, OAuthError> {
    let (account, nonce) = state.split_once(':').ok_or(OAuthError::InvalidState {
        reason: "state is not of the form account:nonce",
    })?;
    let account_id = Uuid::parse_str(account).map_err(|_| OAuthError::InvalidState {
        reason: "state does not carry a valid account id",
    })?;
    if nonce.is_empty() {
        return Err(OAuthError::InvalidState {
            reason: "state nonce is empty",
        });
    }
    Ok(ParsedState {
        account_id,
        nonce: nonce.to_string(),
    })
}

/// Compares the presented nonce against the cookie value in constant time.
pub fn verify_nonce(cookie_nonce: Option<&str>, presented: &str) -> Result<(), OAuthError> {
    let expected = cookie_nonce.ok_or(OAuthError::InvalidState {
        reason: "state cookie is missing",
    })?;
    if bool::from(expected.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(OAuthError::InvalidState {
            reason: "state nonce does not match cookie",
        })
    }
}

pub fn state_cookie_name(provider: ProviderKind) -> String {
    format!("{}_oauth_state", provider.slug())
}

pub fn build_state_cookie(
    provider: ProviderKind,
    nonce: &str,
    ttl_seconds: u64,
    secure: bool,
) -> Cookie<'static> {
    let max_age = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    Cookie::build((state_cookie_name(provider), nonce.to_owned()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age))
        .build()
}

pub fn clear_state_cookie(provider: ProviderKind, secure: bool) -> Cookie<'static> {
    Cookie::build((state_cookie_name(provider), String::new()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build()
}

/// Validate authorization URL meets OAuth 2.0 and security requirements
pub fn validate_authorize_url(provider: ProviderKind, url: &Url) -> Result<(), OAuthError> {
    let misconfigured = || OAuthError::MissingConfiguration {
        provider,
        key: format!("DEALROOM_{}_AUTHORIZE_URL", provider.env_prefix()),
    };

    if url.scheme() != "https" {
        tracing::error!(provider = %provider, "Authorization URL must use HTTPS");
        return Err(misconfigured());
    }

    // RFC 6749 section 3.1
    if url.fragment().is_some() {
        tracing::error!(provider = %provider, "Authorization URL must not include a fragment");
        return Err(misconfigured());
    }

    if url.as_str().len() > MAX_AUTHORIZE_URL_LEN {
        tracing::error!(
            provider = %provider,
            length = url.as_str().len(),
            "Authorization URL exceeds maximum length"
        );
        return Err(misconfigured());
    }

    Ok(())
}

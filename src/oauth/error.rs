//! Domain errors raised by the OAuth connector core.

use thiserror::Error;

use super::ProviderKind;
use crate::crypto::CryptoError;

/// Failure taxonomy for authorization, token storage and refresh.
///
/// Nothing in the core retries; every variant is surfaced to the caller.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("user is not a member of the requested account")]
    AccessDenied,
    #[error("{provider} is not configured; set {key}")]
    MissingConfiguration { provider: ProviderKind, key: String },
    #[error("OAuth state verification failed: {reason}")]
    InvalidState { reason: &'static str },
    #[error("{provider} connection must be reauthorized")]
    ReauthorizationRequired { provider: ProviderKind },
    #[error("{provider} request failed{}", status.map(|s| format!(" with status {s}")).unwrap_or_default())]
    ProviderError {
        provider: ProviderKind,
        status: Option<u16>,
        body: Option<String>,
    },
    #[error("no {provider} connection for this account")]
    NotFound { provider: ProviderKind },
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("token storage failed: {0}")]
    Storage(#[from] sea_orm::DbErr),
    #[error("token encryption failed: {0}")]
    Crypto(#[from] CryptoError),
}

impl OAuthError {
    pub fn provider_error(
        provider: ProviderKind,
        status: Option<u16>,
        body: impl Into<Option<String>>,
    ) -> Self {
        OAuthError::ProviderError {
            provider,
            status,
            body: body.into(),
        }
    }

    /// Short, secret-free reason placed in the frontend redirect after a failed callback.
    pub fn redirect_reason(&self) -> &'static str {
        match self {
            OAuthError::Unauthenticated => "unauthenticated",
            OAuthError::AccessDenied => "access_denied",
            OAuthError::MissingConfiguration { .. } => "not_configured",
            OAuthError::InvalidState { .. } => "invalid_state",
            OAuthError::ReauthorizationRequired { .. } => "reauthorization_required",
            OAuthError::ProviderError { .. } => "provider_error",
            OAuthError::NotFound { .. } | OAuthError::UnknownProvider(_) => "not_found",
            OAuthError::BadRequest(_) => "bad_request",
            OAuthError::Storage(_) | OAuthError::Crypto(_) => "internal_error",
        }
    }
}

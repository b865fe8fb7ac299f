//! Stored provider tokens and the storage seam.

use std::{collections::HashMap, fmt};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OAuthError, ProviderKind};

/// Credentials held for one `(account_id, provider)` connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` means the provider issued a non-expiring token.
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    /// Email or user id reported by the provider's identity endpoint.
    pub account_identity: Option<String>,
    pub needs_reauthorization: bool,
}

impl ProviderToken {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
            account_identity: None,
            needs_reauthorization: false,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }
}

impl fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderToken")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("account_identity", &self.account_identity)
            .field("needs_reauthorization", &self.needs_reauthorization)
            .finish()
    }
}

/// Persistence for provider tokens, one row per `(account_id, provider)`.
///
/// `put` replaces any existing row and clears the reauthorization flag.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
        token: &ProviderToken,
    ) -> Result<(), OAuthError>;

    async fn get(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<ProviderToken>, OAuthError>;

    async fn mark_reauthorization_required(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), OAuthError>;

    /// Returns whether a row was removed.
    async fn delete(&self, account_id: Uuid, provider: ProviderKind) -> Result<bool, OAuthError>;
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<HashMap<(Uuid, ProviderKind), ProviderToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn put(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
        token: &ProviderToken,
    ) -> Result<(), OAuthError> {
        let mut stored = token.clone();
        stored.needs_reauthorization = false;
        self.tokens
            .write()
            .await
            .insert((account_id, provider), stored);
        Ok(())
    }

    async fn get(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<ProviderToken>, OAuthError> {
        Ok(self.tokens.read().await.get(&(account_id, provider)).cloned())
    }

    async fn mark_reauthorization_required(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), OAuthError> {
        if let Some(token) = self.tokens.write().await.get_mut(&(account_id, provider)) {
            token.needs_reauthorization = true;
        }
        Ok(())
    }

    async fn delete(&self, account_id: Uuid, provider: ProviderKind) -> Result<bool, OAuthError> {
        Ok(self
            .tokens
            .write()
            .await
            .remove(&(account_id, provider))
            .is_some())
    }
}

//! Transparent refresh of expired provider access tokens.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{OAuthError, ProviderClient, ProviderKind, ProviderToken, ResolvedProvider, TokenStore};
use crate::config::AppConfig;

/// Hands out usable access tokens, refreshing expired ones first.
///
/// Refreshes are not serialized; concurrent callers may both refresh and the
/// last write wins.
#[derive(Clone)]
pub struct TokenRefresher {
    config: Arc<AppConfig>,
    store: Arc<dyn TokenStore>,
    client: ProviderClient,
}

impl TokenRefresher {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn TokenStore>, client: ProviderClient) -> Self {
        Self {
            config,
            store,
            client,
        }
    }

    pub async fn ensure_fresh(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<ProviderToken, OAuthError> {
        self.ensure_fresh_at(account_id, provider, Utc::now()).await
    }

    /// Returns the stored token if it is still valid at `now`, otherwise
    /// refreshes it. A failed refresh flags the record and yields
    /// [`OAuthError::ReauthorizationRequired`] unless another caller has
    /// stored a valid token in the meantime. Refreshes are never retried.
    #[instrument(skip(self, now), fields(account_id = %account_id, provider = %provider))]
    pub async fn ensure_fresh_at(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
        now: DateTime<Utc>,
    ) -> Result<ProviderToken, OAuthError> {
        let token = self
            .store
            .get(account_id, provider)
            .await?
            .ok_or(OAuthError::NotFound { provider })?;

        if !token.is_expired_at(now) {
            return Ok(token);
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            warn!("Access token expired and no refresh token is stored");
            self.store
                .mark_reauthorization_required(account_id, provider)
                .await?;
            return Err(OAuthError::ReauthorizationRequired { provider });
        };

        let resolved = ResolvedProvider::resolve(&self.config, provider)?;
        let metric_labels = vec![("provider", provider.slug().to_string())];
        counter!("token_refresh_attempts_total", &metric_labels).increment(1);

        let refresh_start = Instant::now();
        let result = self.client.refresh(&resolved, &refresh_token).await;
        let refresh_duration = refresh_start.elapsed();
        histogram!("token_refresh_latency_ms").record(refresh_duration.as_secs_f64() * 1_000.0);

        let refreshed = result.and_then(|grant| {
            let refreshed = grant.into_token(
                now,
                resolved.descriptor.fallback_lifetime_secs,
                Some(&token),
            );
            if refreshed.is_expired_at(now) {
                Err(OAuthError::provider_error(
                    provider,
                    None,
                    "refreshed token is already expired".to_string(),
                ))
            } else {
                Ok(refreshed)
            }
        });

        match refreshed {
            Ok(refreshed) => {
                self.store.put(account_id, provider, &refreshed).await?;
                counter!("token_refresh_success_total", &metric_labels).increment(1);
                info!(
                    refresh_duration_ms = refresh_duration.as_millis(),
                    expires_at = ?refreshed.expires_at,
                    "Refreshed provider access token"
                );
                Ok(refreshed)
            }
            Err(err) => {
                counter!("token_refresh_failure_total", &metric_labels).increment(1);
                // A concurrent refresh may have rotated the refresh token we sent.
                if let Some(current) = self.store.get(account_id, provider).await? {
                    if !current.needs_reauthorization && !current.is_expired_at(now) {
                        info!(
                            error = %err,
                            "Token refresh failed but the stored token was already replaced"
                        );
                        return Ok(current);
                    }
                }
                warn!(error = %err, "Token refresh failed; connection needs reauthorization");
                self.store
                    .mark_reauthorization_required(account_id, provider)
                    .await?;
                Err(OAuthError::ReauthorizationRequired { provider })
            }
        }
    }
}

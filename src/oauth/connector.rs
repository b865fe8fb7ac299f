//! Authorization-code flow orchestration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{
    MembershipOracle, OAuthError, ProviderClient, ProviderKind, ProviderToken, ResolvedProvider,
    TokenRefresher, TokenStore,
    client::extract_identity,
    membership::require_membership,
    state::{encode_state, generate_nonce, parse_state, state_cookie_name, validate_authorize_url, verify_nonce},
};
use crate::config::AppConfig;

/// Where to send the browser and what to put in the state cookie.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
    pub nonce: String,
    pub cookie_name: String,
}

/// Query parameters the provider appends to the callback URL.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug)]
pub struct CompletedAuthorization {
    pub account_id: Uuid,
    pub token: ProviderToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub is_connected: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub needs_reauthorization: bool,
}

/// Identity endpoint response proxied for an account's connection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IdentityProfile {
    pub provider: ProviderKind,
    pub identity: Option<String>,
    #[schema(value_type = Object)]
    pub profile: serde_json::Value,
}

/// Entry point for every provider flow. Cheap to share behind an `Arc`.
pub struct OAuthConnector {
    config: Arc<AppConfig>,
    store: Arc<dyn TokenStore>,
    membership: Arc<dyn MembershipOracle>,
    client: ProviderClient,
    refresher: TokenRefresher,
}

impl OAuthConnector {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn TokenStore>,
        membership: Arc<dyn MembershipOracle>,
        client: ProviderClient,
    ) -> Self {
        let refresher = TokenRefresher::new(config.clone(), store.clone(), client.clone());
        Self {
            config,
            store,
            membership,
            client,
            refresher,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    /// Builds the provider authorization URL for `account_id`.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn begin_authorization(
        &self,
        provider: ProviderKind,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<AuthorizationRequest, OAuthError> {
        let resolved = ResolvedProvider::resolve(&self.config, provider).inspect_err(|err| {
            tracing::error!(error = %err, "OAuth provider is not configured");
        })?;
        require_membership(self.membership.as_ref(), account_id, user_id).await?;

        let nonce = generate_nonce();
        let state = encode_state(account_id, &nonce);

        let mut url = Url::parse(resolved.authorize_url()).map_err(|_| {
            OAuthError::MissingConfiguration {
                provider,
                key: format!("DEALROOM_{}_AUTHORIZE_URL", provider.env_prefix()),
            }
        })?;
        {
            let scope = resolved.scope();
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &resolved.settings.client_id)
                .append_pair("redirect_uri", &resolved.redirect_uri)
                .append_pair("response_type", "code");
            if !scope.is_empty() {
                query.append_pair("scope", &scope);
            }
            query.append_pair("state", &state);
            if resolved.descriptor.uses_offline_access_param {
                query
                    .append_pair("access_type", "offline")
                    .append_pair("prompt", "consent");
            }
        }
        validate_authorize_url(provider, &url)?;

        counter!("oauth_authorize_started_total", "provider" => provider.slug()).increment(1);
        info!(account_id = %account_id, user_id = %user_id, "OAuth flow initiated");

        Ok(AuthorizationRequest {
            url: url.into(),
            state,
            nonce,
            cookie_name: state_cookie_name(provider),
        })
    }

    /// Verifies the callback against the state cookie, exchanges the code and
    /// stores the resulting token.
    ///
    /// No exchange is attempted unless the nonce matches and `user_id` is
    /// still a member of the account named in `state`.
    #[instrument(skip(self, params, cookie_nonce), fields(provider = %provider))]
    pub async fn complete_authorization(
        &self,
        provider: ProviderKind,
        params: &CallbackParams,
        cookie_nonce: Option<&str>,
        user_id: Uuid,
    ) -> Result<CompletedAuthorization, OAuthError> {
        if let Some(error) = params.error.as_deref() {
            warn!(provider_error = %error, "Provider reported an authorization error");
            let body = match params.error_description.as_deref() {
                Some(description) => format!("{error}: {description}"),
                None => error.to_string(),
            };
            return Err(OAuthError::provider_error(provider, None, body));
        }

        let code = non_empty(params.code.as_deref())
            .ok_or_else(|| OAuthError::BadRequest("missing code parameter".to_string()))?;
        let raw_state = non_empty(params.state.as_deref())
            .ok_or_else(|| OAuthError::BadRequest("missing state parameter".to_string()))?;

        let parsed = parse_state(raw_state)
            .and_then(|parsed| verify_nonce(cookie_nonce, &parsed.nonce).map(|()| parsed))
            .inspect_err(|err| {
                warn!(
                    security_event = true,
                    user_id = %user_id,
                    error = %err,
                    "OAuth state verification failed"
                );
                counter!("oauth_invalid_state_total", "provider" => provider.slug()).increment(1);
            })?;

        require_membership(self.membership.as_ref(), parsed.account_id, user_id).await?;

        let resolved = ResolvedProvider::resolve(&self.config, provider)?;
        let grant = self.client.exchange_code(&resolved, code).await?;
        let mut token = grant.into_token(
            Utc::now(),
            resolved.descriptor.fallback_lifetime_secs,
            None,
        );

        token.account_identity = match self.client.fetch_identity(&resolved, &token.access_token).await {
            Ok(profile) => extract_identity(resolved.descriptor, &profile),
            Err(err) => {
                warn!(error = %err, "Identity lookup failed; storing token without identity");
                None
            }
        };

        self.store.put(parsed.account_id, provider, &token).await?;
        info!(
            account_id = %parsed.account_id,
            user_id = %user_id,
            has_refresh_token = token.refresh_token.is_some(),
            "OAuth connection established"
        );

        Ok(CompletedAuthorization {
            account_id: parsed.account_id,
            token,
        })
    }

    /// Connection status without contacting the provider.
    pub async fn status(
        &self,
        provider: ProviderKind,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<ConnectionStatus, OAuthError> {
        require_membership(self.membership.as_ref(), account_id, user_id).await?;
        let now = Utc::now();
        Ok(match self.store.get(account_id, provider).await? {
            Some(token) => ConnectionStatus {
                is_connected: !token.is_expired_at(now),
                expires_at: token.expires_at,
                needs_reauthorization: token.needs_reauthorization,
            },
            None => ConnectionStatus {
                is_connected: false,
                expires_at: None,
                needs_reauthorization: false,
            },
        })
    }

    /// A usable access token for server-side provider calls.
    pub async fn access_token(
        &self,
        provider: ProviderKind,
        account_id: Uuid,
    ) -> Result<ProviderToken, OAuthError> {
        self.refresher.ensure_fresh(account_id, provider).await
    }

    /// Calls the provider's identity endpoint with a fresh token.
    #[instrument(skip(self), fields(provider = %provider))]
    pub async fn identity(
        &self,
        provider: ProviderKind,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<IdentityProfile, OAuthError> {
        require_membership(self.membership.as_ref(), account_id, user_id).await?;
        let token = self.access_token(provider, account_id).await?;
        let resolved = ResolvedProvider::resolve(&self.config, provider)?;
        let profile = self.client.fetch_identity(&resolved, &token.access_token).await?;
        let identity = extract_identity(resolved.descriptor, &profile).or(token.account_identity);
        Ok(IdentityProfile {
            provider,
            identity,
            profile,
        })
    }

    /// Removes the stored connection.
    pub async fn disconnect(
        &self,
        provider: ProviderKind,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), OAuthError> {
        require_membership(self.membership.as_ref(), account_id, user_id).await?;
        if !self.store.delete(account_id, provider).await? {
            return Err(OAuthError::NotFound { provider });
        }
        info!(account_id = %account_id, user_id = %user_id, provider = %provider, "OAuth connection removed");
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

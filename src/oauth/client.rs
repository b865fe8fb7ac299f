//! HTTP calls to provider token and identity endpoints.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde_json::Value;

use super::{
    OAuthError, ProviderKind, ProviderToken, ResolvedProvider,
    provider::{ACCESS_TOKEN_PLACEHOLDER, ClientAuthMethod, ProviderDescriptor},
};

/// Thin wrapper over a shared `reqwest::Client` with a bounded timeout.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("dealroom-oauth/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        provider: &ResolvedProvider<'_>,
        code: &str,
    ) -> Result<TokenGrant, OAuthError> {
        let form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", provider.redirect_uri.as_str()),
        ];
        self.token_request(provider, form).await
    }

    /// Redeems a refresh token for a new access token.
    pub async fn refresh(
        &self,
        provider: &ResolvedProvider<'_>,
        refresh_token: &str,
    ) -> Result<TokenGrant, OAuthError> {
        let form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.token_request(provider, form).await
    }

    async fn token_request<'f>(
        &self,
        provider: &'f ResolvedProvider<'_>,
        mut form: Vec<(&'static str, &'f str)>,
    ) -> Result<TokenGrant, OAuthError> {
        let kind = provider.kind;
        let mut request = self
            .http
            .post(provider.token_url())
            .header(ACCEPT, "application/json");

        match provider.descriptor.client_auth {
            ClientAuthMethod::RequestBody => {
                form.push(("client_id", provider.settings.client_id.as_str()));
                form.push(("client_secret", provider.settings.client_secret.as_str()));
            }
            ClientAuthMethod::BasicAuth => {
                request = request.basic_auth(
                    &provider.settings.client_id,
                    Some(&provider.settings.client_secret),
                );
            }
        }

        let response = request.form(&form).send().await.map_err(|err| {
            tracing::warn!(provider = %kind, error = %err, "Token endpoint request failed");
            OAuthError::provider_error(kind, None, transport_reason(&err))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|err| {
            tracing::warn!(provider = %kind, error = %err, "Failed to read token endpoint response");
            OAuthError::provider_error(kind, Some(status), transport_reason(&err))
        })?;

        TokenGrant::from_response(kind, status, &body)
    }

    /// Calls the provider's identity endpoint with `access_token`.
    pub async fn fetch_identity(
        &self,
        provider: &ResolvedProvider<'_>,
        access_token: &str,
    ) -> Result<Value, OAuthError> {
        let kind = provider.kind;
        let url = provider.identity_url();

        let request = if url.contains(ACCESS_TOKEN_PLACEHOLDER) {
            let encoded: String =
                url::form_urlencoded::byte_serialize(access_token.as_bytes()).collect();
            self.http.get(url.replace(ACCESS_TOKEN_PLACEHOLDER, &encoded))
        } else {
            self.http.get(url).header(
                AUTHORIZATION,
                format!("{} {}", provider.descriptor.auth_scheme, access_token),
            )
        };

        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|err| {
                // The URL may carry the access token.
                let err = err.without_url();
                tracing::warn!(provider = %kind, error = %err, "Identity request failed");
                OAuthError::provider_error(kind, None, transport_reason(&err))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| OAuthError::provider_error(kind, Some(status.as_u16()), transport_reason(&err)))?;

        if !status.is_success() {
            return Err(OAuthError::provider_error(kind, Some(status.as_u16()), body));
        }

        let profile: Value = serde_json::from_str(&body).map_err(|_| {
            OAuthError::provider_error(
                kind,
                Some(status.as_u16()),
                "identity response was not valid JSON".to_string(),
            )
        })?;

        // Slack reports failures as 200 with `ok: false`.
        if profile.get("ok").and_then(Value::as_bool) == Some(false) {
            let reason = profile
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("ok=false");
            return Err(OAuthError::provider_error(
                kind,
                Some(status.as_u16()),
                reason.to_string(),
            ));
        }

        Ok(profile)
    }
}

fn transport_reason(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else {
        "request failed".to_string()
    }
}

/// Pulls the account identity out of an identity response.
pub fn extract_identity(descriptor: &ProviderDescriptor, profile: &Value) -> Option<String> {
    match profile.pointer(descriptor.identity_pointer)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Parsed token endpoint response.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

impl TokenGrant {
    /// Interprets a token endpoint response.
    ///
    /// Non-2xx statuses, `ok: false` (Slack) and `error` bodies without an
    /// access token (Zoho answers 200 with these) are provider errors.
    /// Successful bodies are never echoed into errors.
    pub fn from_response(
        provider: ProviderKind,
        status: u16,
        body: &str,
    ) -> Result<Self, OAuthError> {
        if !(200..300).contains(&status) {
            return Err(OAuthError::provider_error(
                provider,
                Some(status),
                body.to_string(),
            ));
        }

        let value: Value = serde_json::from_str(body).map_err(|_| {
            OAuthError::provider_error(
                provider,
                Some(status),
                "token response was not valid JSON".to_string(),
            )
        })?;

        if value.get("ok").and_then(Value::as_bool) == Some(false) {
            let reason = string_field(&value, "error").unwrap_or_else(|| "ok=false".to_string());
            return Err(OAuthError::provider_error(provider, Some(status), reason));
        }

        let Some(access_token) = string_field(&value, "access_token") else {
            let reason = string_field(&value, "error")
                .unwrap_or_else(|| "token response missing access_token".to_string());
            return Err(OAuthError::provider_error(provider, Some(status), reason));
        };

        let expires_in = value.get("expires_in").and_then(|raw| match raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        });

        Ok(Self {
            access_token,
            refresh_token: string_field(&value, "refresh_token"),
            expires_in,
            scope: string_field(&value, "scope"),
        })
    }

    /// Builds the token to store.
    ///
    /// Expiry is `now + expires_in` (or the provider's fallback lifetime),
    /// truncated to whole seconds. Fields the provider omitted on refresh
    /// are carried over from `previous`.
    pub fn into_token(
        self,
        now: DateTime<Utc>,
        fallback_lifetime_secs: Option<i64>,
        previous: Option<&ProviderToken>,
    ) -> ProviderToken {
        let issued_at = DateTime::<Utc>::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = self
            .expires_in
            .or(fallback_lifetime_secs)
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime));

        ProviderToken {
            access_token: self.access_token,
            refresh_token: self
                .refresh_token
                .or_else(|| previous.and_then(|p| p.refresh_token.clone())),
            expires_at,
            scope: self
                .scope
                .or_else(|| previous.and_then(|p| p.scope.clone())),
            account_identity: previous.and_then(|p| p.account_identity.clone()),
            needs_reauthorization: false,
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

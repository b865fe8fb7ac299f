//! Static provider descriptors.
//!
//! Every supported provider is described by a [`ProviderDescriptor`]; the
//! authorization, exchange, refresh and identity code paths are generic over it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::OAuthError;
use crate::config::{AppConfig, ProviderSettings};

/// Supported OAuth providers, addressed by their URL slug.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gmail,
    Hubspot,
    Salesforce,
    Zoho,
    Pipedrive,
    Slack,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        ProviderKind::Gmail,
        ProviderKind::Hubspot,
        ProviderKind::Salesforce,
        ProviderKind::Zoho,
        ProviderKind::Pipedrive,
        ProviderKind::Slack,
    ];

    pub fn slug(self) -> &'static str {
        self.descriptor().slug
    }

    /// Prefix used for this provider's configuration keys (e.g. `GMAIL`).
    pub fn env_prefix(self) -> &'static str {
        match self {
            ProviderKind::Gmail => "GMAIL",
            ProviderKind::Hubspot => "HUBSPOT",
            ProviderKind::Salesforce => "SALESFORCE",
            ProviderKind::Zoho => "ZOHO",
            ProviderKind::Pipedrive => "PIPEDRIVE",
            ProviderKind::Slack => "SLACK",
        }
    }

    pub fn descriptor(self) -> &'static ProviderDescriptor {
        match self {
            ProviderKind::Gmail => &GMAIL,
            ProviderKind::Hubspot => &HUBSPOT,
            ProviderKind::Salesforce => &SALESFORCE,
            ProviderKind::Zoho => &ZOHO,
            ProviderKind::Pipedrive => &PIPEDRIVE,
            ProviderKind::Slack => &SLACK,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ProviderKind {
    type Err = OAuthError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == value)
            .ok_or_else(|| OAuthError::UnknownProvider(value.to_string()))
    }
}

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientAuthMethod {
    /// `client_id` and `client_secret` as form fields.
    RequestBody,
    /// HTTP Basic with the client id and secret.
    BasicAuth,
}

/// Endpoint and protocol quirks for a single provider.
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub slug: &'static str,
    pub display_name: &'static str,
    pub authorize_url: &'static str,
    pub token_url: &'static str,
    /// Identity endpoint. `{access_token}` is substituted into the path for
    /// providers that take the token there instead of in a header.
    pub identity_url: &'static str,
    /// JSON pointer to the account identity inside the identity response.
    pub identity_pointer: &'static str,
    /// Scheme used in the `Authorization` header for identity calls.
    pub auth_scheme: &'static str,
    pub scopes: &'static [&'static str],
    pub scope_separator: &'static str,
    pub client_id_key: &'static str,
    /// Adds `access_type=offline&prompt=consent` so a refresh token is issued.
    pub uses_offline_access_param: bool,
    /// Lifetime assumed when the token response omits `expires_in`.
    pub fallback_lifetime_secs: Option<i64>,
    pub client_auth: ClientAuthMethod,
}

impl ProviderDescriptor {
    pub fn default_scope_string(&self) -> String {
        self.scopes.join(self.scope_separator)
    }
}

pub const ACCESS_TOKEN_PLACEHOLDER: &str = "{access_token}";

static GMAIL: ProviderDescriptor = ProviderDescriptor {
    slug: "gmail",
    display_name: "Google (Gmail & Calendar)",
    authorize_url: "https://accounts.google.com/o/oauth2/v2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    identity_url: "https://www.googleapis.com/oauth2/v2/userinfo",
    identity_pointer: "/email",
    auth_scheme: "Bearer",
    scopes: &[
        "https://www.googleapis.com/auth/gmail.readonly",
        "https://www.googleapis.com/auth/gmail.send",
        "https://www.googleapis.com/auth/userinfo.email",
        "https://www.googleapis.com/auth/calendar.readonly",
        "https://www.googleapis.com/auth/calendar.events",
    ],
    scope_separator: " ",
    client_id_key: "GMAIL_CLIENT_ID",
    uses_offline_access_param: true,
    fallback_lifetime_secs: None,
    client_auth: ClientAuthMethod::RequestBody,
};

static HUBSPOT: ProviderDescriptor = ProviderDescriptor {
    slug: "hubspot",
    display_name: "HubSpot",
    authorize_url: "https://app.hubspot.com/oauth/authorize",
    token_url: "https://api.hubapi.com/oauth/v1/token",
    identity_url: "https://api.hubapi.com/oauth/v1/access-tokens/{access_token}",
    identity_pointer: "/user",
    auth_scheme: "Bearer",
    scopes: &[
        "oauth",
        "crm.objects.contacts.read",
        "crm.objects.contacts.write",
        "crm.objects.deals.read",
        "crm.objects.deals.write",
    ],
    scope_separator: " ",
    client_id_key: "HUBSPOT_CLIENT_ID",
    uses_offline_access_param: false,
    fallback_lifetime_secs: None,
    client_auth: ClientAuthMethod::RequestBody,
};

static SALESFORCE: ProviderDescriptor = ProviderDescriptor {
    slug: "salesforce",
    display_name: "Salesforce",
    authorize_url: "https://login.salesforce.com/services/oauth2/authorize",
    token_url: "https://login.salesforce.com/services/oauth2/token",
    identity_url: "https://login.salesforce.com/services/oauth2/userinfo",
    identity_pointer: "/email",
    auth_scheme: "Bearer",
    scopes: &["openid", "api", "refresh_token", "id", "profile", "email"],
    scope_separator: " ",
    client_id_key: "SALESFORCE_CLIENT_ID",
    uses_offline_access_param: false,
    // Salesforce omits expires_in; sessions default to two hours.
    fallback_lifetime_secs: Some(7200),
    client_auth: ClientAuthMethod::RequestBody,
};

static ZOHO: ProviderDescriptor = ProviderDescriptor {
    slug: "zoho",
    display_name: "Zoho CRM",
    authorize_url: "https://accounts.zoho.com/oauth/v2/auth",
    token_url: "https://accounts.zoho.com/oauth/v2/token",
    identity_url: "https://accounts.zoho.com/oauth/user/info",
    identity_pointer: "/Email",
    auth_scheme: "Zoho-oauthtoken",
    scopes: &["ZohoCRM.modules.ALL", "ZohoCRM.settings.READ"],
    scope_separator: ",",
    client_id_key: "ZOHO_CLIENT_ID",
    uses_offline_access_param: true,
    fallback_lifetime_secs: None,
    client_auth: ClientAuthMethod::RequestBody,
};

static PIPEDRIVE: ProviderDescriptor = ProviderDescriptor {
    slug: "pipedrive",
    display_name: "Pipedrive",
    authorize_url: "https://oauth.pipedrive.com/oauth/authorize",
    token_url: "https://oauth.pipedrive.com/oauth/token",
    identity_url: "https://api.pipedrive.com/v1/users/me",
    identity_pointer: "/data/email",
    auth_scheme: "Bearer",
    scopes: &[],
    scope_separator: " ",
    client_id_key: "PIPEDRIVE_CLIENT_ID",
    uses_offline_access_param: false,
    fallback_lifetime_secs: None,
    client_auth: ClientAuthMethod::BasicAuth,
};

static SLACK: ProviderDescriptor = ProviderDescriptor {
    slug: "slack",
    display_name: "Slack",
    authorize_url: "https://slack.com/oauth/v2/authorize",
    token_url: "https://slack.com/api/oauth.v2.access",
    identity_url: "https://slack.com/api/auth.test",
    identity_pointer: "/user",
    auth_scheme: "Bearer",
    scopes: &["chat:write", "users:read", "app_mentions:read"],
    scope_separator: ",",
    client_id_key: "SLACK_CLIENT_ID",
    uses_offline_access_param: false,
    fallback_lifetime_secs: None,
    client_auth: ClientAuthMethod::RequestBody,
};

/// A provider descriptor combined with this deployment's client registration.
#[derive(Debug, Clone)]
pub struct ResolvedProvider<'a> {
    pub kind: ProviderKind,
    pub descriptor: &'static ProviderDescriptor,
    pub settings: &'a ProviderSettings,
    pub redirect_uri: String,
}

impl<'a> ResolvedProvider<'a> {
    /// Fails with [`OAuthError::MissingConfiguration`] when the provider has no client registration.
    pub fn resolve(config: &'a AppConfig, kind: ProviderKind) -> Result<Self, OAuthError> {
        let settings = config.provider_settings(kind)?;
        Ok(Self {
            kind,
            descriptor: kind.descriptor(),
            settings,
            redirect_uri: config.redirect_uri(kind, settings),
        })
    }

    pub fn authorize_url(&self) -> &str {
        self.settings
            .authorize_url
            .as_deref()
            .unwrap_or(self.descriptor.authorize_url)
    }

    pub fn token_url(&self) -> &str {
        self.settings
            .token_url
            .as_deref()
            .unwrap_or(self.descriptor.token_url)
    }

    pub fn identity_url(&self) -> &str {
        self.settings
            .identity_url
            .as_deref()
            .unwrap_or(self.descriptor.identity_url)
    }

    /// Scope parameter value, honoring a configured scope override.
    pub fn scope(&self) -> String {
        match &self.settings.scopes {
            Some(scopes) => scopes.join(self.descriptor.scope_separator),
            None => self.descriptor.default_scope_string(),
        }
    }
}

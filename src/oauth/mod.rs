//! # OAuth Connector
//!
//! Delegated OAuth access to external CRM and messaging providers on behalf
//! of an account:
//!
//! - [`OAuthConnector`] builds authorization URLs and completes callbacks,
//!   verifying the anti-CSRF nonce and re-checking account membership.
//! - [`TokenStore`] persists one token per `(account_id, provider)`.
//! - [`TokenRefresher`] hands out access tokens, refreshing expired ones first.
//!
//! Every provider runs through the same generic flow, parameterized by a
//! static [`ProviderDescriptor`].

pub mod client;
pub mod connector;
pub mod error;
pub mod membership;
pub mod provider;
pub mod refresher;
pub mod state;
pub mod token;

pub use client::{ProviderClient, TokenGrant};
pub use connector::{
    AuthorizationRequest, CallbackParams, CompletedAuthorization, ConnectionStatus,
    IdentityProfile, OAuthConnector,
};
pub use error::OAuthError;
pub use membership::{MembershipOracle, StaticMembership};
pub use provider::{ProviderDescriptor, ProviderKind, ResolvedProvider};
pub use refresher::TokenRefresher;
pub use token::{InMemoryTokenStore, ProviderToken, TokenStore};

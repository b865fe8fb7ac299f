//! # Data Models
//!
//! SeaORM entities for accounts, memberships and stored provider tokens, plus
//! small response types shared by handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod account;
pub mod account_member;
pub mod provider_token;

pub use account::Entity as Account;
pub use account_member::Entity as AccountMember;
pub use provider_token::Entity as ProviderTokenRecord;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "dealroom-oauth".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

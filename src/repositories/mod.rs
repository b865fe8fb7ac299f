//! # Repository Layer
//!
//! SeaORM-backed data access. Every query that touches tokens or membership
//! is scoped by `account_id`.

pub mod account;
pub mod membership;
pub mod provider_token;

pub use account::AccountRepository;
pub use membership::MembershipRepository;
pub use provider_token::SeaOrmTokenStore;

//! # Dealroom OAuth Connector
//!
//! Delegated OAuth connections between Dealroom accounts and external CRM
//! and messaging providers: authorization, CSRF state verification, encrypted
//! token storage and transparent refresh, served over HTTP.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod repositories;
pub mod server;
pub mod telemetry;
pub use migration;

//! Database migrations for the Dealroom OAuth connector.

pub use sea_orm_migration::prelude::*;

mod m2026_01_05_000001_create_accounts;
mod m2026_01_05_000002_create_account_members;
mod m2026_01_05_000003_create_provider_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_01_05_000001_create_accounts::Migration),
            Box::new(m2026_01_05_000002_create_account_members::Migration),
            Box::new(m2026_01_05_000003_create_provider_tokens::Migration),
        ]
    }
}

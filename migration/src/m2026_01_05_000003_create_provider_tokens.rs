//! Migration to create the provider_tokens table.
//!
//! One row per (account_id, provider). Token material is stored as AES-GCM
//! ciphertext; the unique index backs the upsert in the token store.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProviderTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProviderTokens::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ProviderTokens::AccountId).uuid().not_null())
                    .col(ColumnDef::new(ProviderTokens::Provider).text().not_null())
                    .col(
                        ColumnDef::new(ProviderTokens::AccessTokenCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ProviderTokens::RefreshTokenCiphertext)
                            .binary()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ProviderTokens::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(ProviderTokens::Scope).text().null())
                    .col(ColumnDef::new(ProviderTokens::AccountIdentity).text().null())
                    .col(
                        ColumnDef::new(ProviderTokens::NeedsReauthorization)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ProviderTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(ProviderTokens::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_provider_tokens_account_id")
                            .from(ProviderTokens::Table, ProviderTokens::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_provider_tokens_account_provider")
                    .table(ProviderTokens::Table)
                    .col(ProviderTokens::AccountId)
                    .col(ProviderTokens::Provider)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_provider_tokens_account_provider")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ProviderTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ProviderTokens {
    Table,
    Id,
    AccountId,
    Provider,
    AccessTokenCiphertext,
    RefreshTokenCiphertext,
    ExpiresAt,
    Scope,
    AccountIdentity,
    NeedsReauthorization,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}

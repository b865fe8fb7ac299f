//! Migration to create the account_members table.
//!
//! Maps users onto accounts with a role. The connector only reads it.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccountMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccountMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccountMembers::AccountId).uuid().not_null())
                    .col(ColumnDef::new(AccountMembers::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(AccountMembers::Role)
                            .text()
                            .not_null()
                            .default("member"),
                    )
                    .col(
                        ColumnDef::new(AccountMembers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_members_account_id")
                            .from(AccountMembers::Table, AccountMembers::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_account_members_account_user")
                    .table(AccountMembers::Table)
                    .col(AccountMembers::AccountId)
                    .col(AccountMembers::UserId)
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
                    .name("idx_account_members_account_user")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(AccountMembers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccountMembers {
    Table,
    Id,
    AccountId,
    UserId,
    Role,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
}

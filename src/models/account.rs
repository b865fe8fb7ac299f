//! Account entity model
//!
//! Accounts are the tenant boundary of the CRM; every stored provider token
//! belongs to one.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::account_member::Entity")]
    AccountMember,
    #[sea_orm(has_many = "super::provider_token::Entity")]
    ProviderToken,
}

impl Related<super::account_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountMember.def()
    }
}

impl Related<super::provider_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

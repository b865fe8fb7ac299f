//! # Account Repository
//!
//! Accounts are provisioned by the CRM; the connector only reads them. Creation
//! exists for seeding local databases and tests.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::models::account::{ActiveModel as AccountActiveModel, Entity as Account, Model as AccountModel};

#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: Arc<DatabaseConnection>,
}

impl AccountRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(&self, name: &str) -> Result<AccountModel, DbErr> {
        let account = AccountActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now().into()),
        };
        account.insert(self.db.as_ref()).await
    }

    pub async fn find_by_id(&self, account_id: Uuid) -> Result<Option<AccountModel>, DbErr> {
        Account::find_by_id(account_id).one(self.db.as_ref()).await
    }
}

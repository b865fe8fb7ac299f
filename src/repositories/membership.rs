//! # Membership Repository
//!
//! Reads `account_members` to answer "may this user act for this account".

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::models::account_member::{self, Entity as AccountMember, MemberRole};
use crate::oauth::{MembershipOracle, OAuthError};

#[derive(Debug, Clone)]
pub struct MembershipRepository {
    db: Arc<DatabaseConnection>,
}

impl MembershipRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn add_member(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<account_member::Model, DbErr> {
        let member = account_member::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            user_id: Set(user_id),
            role: Set(role.as_str().to_string()),
            created_at: Set(Utc::now().into()),
        };
        member.insert(self.db.as_ref()).await
    }

    /// Returns whether a membership row was removed.
    pub async fn remove_member(&self, account_id: Uuid, user_id: Uuid) -> Result<bool, DbErr> {
        let result = AccountMember::delete_many()
            .filter(account_member::Column::AccountId.eq(account_id))
            .filter(account_member::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn find_member(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<account_member::Model>, DbErr> {
        AccountMember::find()
            .filter(account_member::Column::AccountId.eq(account_id))
            .filter(account_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
    }
}

#[async_trait]
impl MembershipOracle for MembershipRepository {
    async fn role_of(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, OAuthError> {
        Ok(self
            .find_member(account_id, user_id)
            .await?
            .map(|member| member.member_role()))
    }
}

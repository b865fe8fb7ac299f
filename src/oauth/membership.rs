//! Account membership checks.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::OAuthError;
use crate::models::account_member::MemberRole;

/// Read-only view of `(account_id, user_id) -> role`.
#[async_trait]
pub trait MembershipOracle: Send + Sync {
    async fn role_of(&self, account_id: Uuid, user_id: Uuid)
    -> Result<Option<MemberRole>, OAuthError>;
}

/// Fails with [`OAuthError::AccessDenied`] unless `user_id` belongs to `account_id`.
pub async fn require_membership(
    oracle: &dyn MembershipOracle,
    account_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRole, OAuthError> {
    match oracle.role_of(account_id, user_id).await? {
        Some(role) => Ok(role),
        None => {
            tracing::warn!(
                account_id = %account_id,
                user_id = %user_id,
                "User is not a member of the requested account"
            );
            Err(OAuthError::AccessDenied)
        }
    }
}

/// In-process membership table for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: RwLock<HashMap<(Uuid, Uuid), MemberRole>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, account_id: Uuid, user_id: Uuid, role: MemberRole) {
        self.members
            .write()
            .await
            .insert((account_id, user_id), role);
    }

    pub async fn revoke(&self, account_id: Uuid, user_id: Uuid) {
        self.members.write().await.remove(&(account_id, user_id));
    }
}

#[async_trait]
impl MembershipOracle for StaticMembership {
    async fn role_of(
        &self,
        account_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, OAuthError> {
        Ok(self.members.read().await.get(&(account_id, user_id)).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grant_and_revoke() {
        let oracle = StaticMembership::new();
        let account = Uuid::new_v4();
        let user = Uuid::new_v4();

        assert!(matches!(
            require_membership(&oracle, account, user).await,
            Err(OAuthError::AccessDenied)
        ));

        oracle.grant(account, user, MemberRole::Admin).await;
        assert_eq!(
            require_membership(&oracle, account, user).await.unwrap(),
            MemberRole::Admin
        );

        // Membership is per account.
        assert!(
            require_membership(&oracle, Uuid::new_v4(), user)
                .await
                .is_err()
        );

        oracle.revoke(account, user).await;
        assert!(require_membership(&oracle, account, user).await.is_err());
    }
}

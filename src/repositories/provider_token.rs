//! Encrypted token persistence through SeaORM.
//!
//! Access and refresh tokens are sealed with AES-256-GCM; the AAD binds each
//! ciphertext to its `(account_id, provider)` row so a ciphertext copied to
//! another row fails to decrypt.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::crypto::{CryptoKey, decrypt_token, encrypt_token};
use crate::models::provider_token::{self, Column, Entity as ProviderTokenEntity};
use crate::oauth::{OAuthError, ProviderKind, ProviderToken, TokenStore};

/// Repository for provider token rows
#[derive(Debug, Clone)]
pub struct SeaOrmTokenStore {
    db: Arc<DatabaseConnection>,
    crypto_key: CryptoKey,
}

impl SeaOrmTokenStore {
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    fn decode(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
        row: provider_token::Model,
    ) -> Result<ProviderToken, OAuthError> {
        let decrypt = |ciphertext: &[u8]| {
            decrypt_token(&self.crypto_key, account_id, provider, ciphertext).map_err(|err| {
                // Never log ciphertext or key material.
                tracing::error!(
                    account_id = %account_id,
                    provider = %provider,
                    "Token decryption failed"
                );
                OAuthError::from(err)
            })
        };

        Ok(ProviderToken {
            access_token: decrypt(&row.access_token_ciphertext)?,
            refresh_token: row
                .refresh_token_ciphertext
                .as_deref()
                .map(decrypt)
                .transpose()?,
            expires_at: row.expires_at.map(|at| at.with_timezone(&Utc)),
            scope: row.scope,
            account_identity: row.account_identity,
            needs_reauthorization: row.needs_reauthorization,
        })
    }
}

#[async_trait]
impl TokenStore for SeaOrmTokenStore {
    async fn put(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
        token: &ProviderToken,
    ) -> Result<(), OAuthError> {
        let access_ciphertext =
            encrypt_token(&self.crypto_key, account_id, provider, &token.access_token)?;
        let refresh_ciphertext = token
            .refresh_token
            .as_deref()
            .map(|refresh| encrypt_token(&self.crypto_key, account_id, provider, refresh))
            .transpose()?;
        let now: DateTimeWithTimeZone = Utc::now().into();

        let row = provider_token::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_id: Set(account_id),
            provider: Set(provider.slug().to_string()),
            access_token_ciphertext: Set(access_ciphertext),
            refresh_token_ciphertext: Set(refresh_ciphertext),
            expires_at: Set(token.expires_at.map(Into::into)),
            scope: Set(token.scope.clone()),
            account_identity: Set(token.account_identity.clone()),
            needs_reauthorization: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        ProviderTokenEntity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::AccountId, Column::Provider])
                    .update_columns([
                        Column::AccessTokenCiphertext,
                        Column::RefreshTokenCiphertext,
                        Column::ExpiresAt,
                        Column::Scope,
                        Column::AccountIdentity,
                        Column::NeedsReauthorization,
                        Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        tracing::debug!(account_id = %account_id, provider = %provider, "Stored provider token");
        Ok(())
    }

    async fn get(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<Option<ProviderToken>, OAuthError> {
        ProviderTokenEntity::find()
            .filter(Column::AccountId.eq(account_id))
            .filter(Column::Provider.eq(provider.slug()))
            .one(self.db.as_ref())
            .await?
            .map(|row| self.decode(account_id, provider, row))
            .transpose()
    }

    async fn mark_reauthorization_required(
        &self,
        account_id: Uuid,
        provider: ProviderKind,
    ) -> Result<(), OAuthError> {
        let now: DateTimeWithTimeZone = Utc::now().into();
        ProviderTokenEntity::update_many()
            .col_expr(Column::NeedsReauthorization, Expr::value(true))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::AccountId.eq(account_id))
            .filter(Column::Provider.eq(provider.slug()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    async fn delete(&self, account_id: Uuid, provider: ProviderKind) -> Result<bool, OAuthError> {
        let result = ProviderTokenEntity::delete_many()
            .filter(Column::AccountId.eq(account_id))
            .filter(Column::Provider.eq(provider.slug()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected > 0)
    }
}

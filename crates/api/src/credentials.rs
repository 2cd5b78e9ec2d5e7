//! Stored AI provider credentials
//!
//! One credential per account, encrypted at rest. The raw key is returned
//! only to the generation dispatcher; the UI only ever sees the masked
//! preview computed at save time.

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;

use crate::crypto::{mask_key, SecretsCipher};
use crate::error::{ApiError, ApiResult};

/// What the settings UI gets back.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CredentialView {
    pub provider: String,
    pub has_key: bool,
    pub masked_key: Option<String>,
}

#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
    cipher: Arc<SecretsCipher>,
}

impl CredentialStore {
    pub fn new(pool: PgPool, cipher: SecretsCipher) -> Self {
        Self {
            pool,
            cipher: Arc::new(cipher),
        }
    }

    /// Upsert the account's credential. Replaces any prior value for the
    /// account; the preview is computed here so reads never decrypt.
    pub async fn save(&self, account_id: Uuid, provider: &str, raw_key: &str) -> ApiResult<()> {
        let encrypted = self
            .cipher
            .encrypt(raw_key)
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        let preview = mask_key(raw_key);

        sqlx::query(
            r#"
            INSERT INTO ai_credentials (account_id, provider, encrypted_key, key_preview)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (account_id) DO UPDATE SET
                provider = EXCLUDED.provider,
                encrypted_key = EXCLUDED.encrypted_key,
                key_preview = EXCLUDED.key_preview,
                updated_at = NOW()
            "#,
        )
        .bind(account_id)
        .bind(provider)
        .bind(&encrypted)
        .bind(&preview)
        .execute(&self.pool)
        .await?;

        tracing::info!(account_id = %account_id, provider = %provider, "AI credential saved");
        Ok(())
    }

    pub async fn get_view(&self, account_id: Uuid) -> ApiResult<CredentialView> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT provider, key_preview FROM ai_credentials WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((provider, preview)) => CredentialView {
                provider,
                has_key: true,
                masked_key: Some(preview),
            },
            None => CredentialView {
                provider: String::new(),
                has_key: false,
                masked_key: None,
            },
        })
    }

    /// Decrypt the stored key for a provider call. `MissingAiSettings` when
    /// the account never configured one.
    pub async fn get_decrypted(&self, account_id: Uuid) -> ApiResult<String> {
        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT encrypted_key FROM ai_credentials WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        let (blob,) = row.ok_or(ApiError::MissingAiSettings)?;

        self.cipher
            .decrypt(&blob)
            .map_err(|e| ApiError::Internal(format!("credential decryption failed: {}", e)))
    }
}

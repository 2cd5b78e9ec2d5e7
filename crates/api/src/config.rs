//! Server configuration
//!
//! Every externally supplied value is read exactly once here, at startup,
//! and threaded into component constructors. Nothing reads the environment
//! mid-request.

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// HS256 secret for bearer tokens issued by the identity flow.
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    /// Base64-encoded 32-byte key for credential encryption at rest.
    pub credential_encryption_key: String,
    /// Shared secret the payment provider sends in x-provider-token.
    pub payment_webhook_token: Option<String>,
    /// AI provider endpoint and call bounds.
    pub ai_base_url: String,
    pub ai_model: String,
    pub ai_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let credential_encryption_key = std::env::var("CREDENTIAL_ENCRYPTION_KEY")
            .context("CREDENTIAL_ENCRYPTION_KEY must be set")?;

        Ok(Self {
            database_url,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            jwt_secret,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(24),
            credential_encryption_key,
            payment_webhook_token: std::env::var("PAYMENT_WEBHOOK_TOKEN").ok(),
            ai_base_url: std::env::var("AI_PROVIDER_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            ai_model: std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            ai_timeout_secs: std::env::var("AI_PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        })
    }
}

//! Application state

use std::sync::Arc;

use sqlx::PgPool;

use bookshelf_billing::{BillingService, ProductMapping, WebhookConfig};

use crate::auth::JwtManager;
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::crypto::SecretsCipher;
use crate::generation::GenerationService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub jwt_manager: JwtManager,
    pub billing: Arc<BillingService>,
    pub credentials: CredentialStore,
    pub generation: GenerationService,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> anyhow::Result<Self> {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);

        let webhook_config = WebhookConfig {
            shared_token: config.payment_webhook_token.clone(),
            products: ProductMapping::from_env(),
        };
        let billing = Arc::new(BillingService::new(pool.clone(), webhook_config));
        tracing::info!("Billing service initialized");

        let cipher = SecretsCipher::new(&config.credential_encryption_key)?;
        let credentials = CredentialStore::new(pool.clone(), cipher);
        tracing::info!("Credential store initialized");

        let generation = GenerationService::new(pool.clone(), &config, credentials.clone());
        tracing::info!(
            provider_base_url = %config.ai_base_url,
            model = %config.ai_model,
            "Generation service initialized"
        );

        Ok(Self {
            pool,
            config,
            jwt_manager,
            billing,
            credentials,
            generation,
        })
    }
}

//! Generation dispatcher
//!
//! Orchestrates one metered AI generation: balance pre-check, credential
//! resolution, provider call, then the server-side debit commit. The debit
//! lives in the same request as the provider call so there is no
//! client-issued second round trip that could be skipped.

pub mod client;
pub mod prompts;

pub use client::{ProviderClient, ProviderError};
pub use prompts::{build_prompt, Prompt};

use bookshelf_billing::{
    BillingEventBuilder, BillingEventLogger, BillingEventType, DenialReason, MeteringGate,
};
use bookshelf_shared::ActionType;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, serde::Serialize)]
pub struct GenerationOutcome {
    pub output: String,
    /// None for unlimited tiers.
    pub remaining_credits: Option<i32>,
}

#[derive(Clone)]
pub struct GenerationService {
    metering: MeteringGate,
    events: BillingEventLogger,
    credentials: CredentialStore,
    provider: ProviderClient,
}

impl GenerationService {
    pub fn new(pool: PgPool, config: &Config, credentials: CredentialStore) -> Self {
        Self {
            metering: MeteringGate::new(pool.clone()),
            events: BillingEventLogger::new(pool),
            credentials,
            provider: ProviderClient::new(
                &config.ai_base_url,
                &config.ai_model,
                config.ai_timeout_secs,
            ),
        }
    }

    pub async fn generate(
        &self,
        account_id: Uuid,
        action: ActionType,
        context: &Value,
    ) -> ApiResult<GenerationOutcome> {
        // 1. Fail fast before any provider cost is incurred.
        let check = match self.metering.check_balance(account_id, action).await? {
            Ok(check) => check,
            Err(reason) => {
                self.log_denied(account_id, action, reason).await;
                return Err(match reason {
                    DenialReason::UsageNotInitialized => ApiError::UsageNotInitialized,
                    DenialReason::MonthlyLimitReached => ApiError::MonthlyLimitReached,
                });
            }
        };

        // 2. The account's own provider key.
        let api_key = self.credentials.get_decrypted(account_id).await?;

        // 3-4. Prompt and bounded provider call. No debit on any failure.
        let prompt = build_prompt(action, context);
        let output = match self.provider.complete(&api_key, &prompt).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(
                    account_id = %account_id,
                    action = %action,
                    error = %e,
                    "Provider call failed - no credits debited"
                );
                self.log_event(
                    account_id,
                    BillingEventType::GenerationFailed,
                    serde_json::json!({ "action": action, "error": e.to_string() }),
                )
                .await;
                return Err(ApiError::Provider(e.to_string()));
            }
        };

        // 5. Commit the debit. A lost race means a concurrent request drained
        // the balance between check and commit; the provider cost is already
        // sunk, so the output still goes to the caller and the miss is logged
        // for reconciliation.
        let remaining = if check.unlimited {
            None
        } else {
            match self.metering.commit(account_id, action).await {
                Ok(remaining) => Some(remaining),
                Err(bookshelf_billing::BillingError::MonthlyLimitReached) => {
                    tracing::error!(
                        account_id = %account_id,
                        action = %action,
                        "Debit commit lost a concurrent race - output delivered without debit"
                    );
                    self.log_event(
                        account_id,
                        BillingEventType::GenerationDebitMissed,
                        serde_json::json!({ "action": action, "cost": action.cost() }),
                    )
                    .await;
                    Some(0)
                }
                Err(e) => return Err(e.into()),
            }
        };

        // 6. Best-effort audit trail.
        self.log_event(
            account_id,
            BillingEventType::GenerationCompleted,
            serde_json::json!({
                "action": action,
                "cost": action.cost(),
                "remaining": remaining,
            }),
        )
        .await;

        Ok(GenerationOutcome {
            output,
            remaining_credits: remaining,
        })
    }

    async fn log_denied(&self, account_id: Uuid, action: ActionType, reason: DenialReason) {
        self.log_event(
            account_id,
            BillingEventType::GenerationDenied,
            serde_json::json!({ "action": action, "reason": format!("{:?}", reason) }),
        )
        .await;
    }

    async fn log_event(&self, account_id: Uuid, event_type: BillingEventType, data: Value) {
        if let Err(e) = self
            .events
            .log_event(BillingEventBuilder::new(Some(account_id), event_type).data(data))
            .await
        {
            tracing::warn!(error = %e, "Failed to log generation event");
        }
    }
}

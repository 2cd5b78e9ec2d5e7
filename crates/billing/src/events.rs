//! Billing event audit log
//!
//! Append-only record of metering and reconciliation activity, used for
//! usage analytics and debugging. Logging is always best-effort: callers
//! warn and continue when an insert fails, so the audit trail can never
//! mask an otherwise-successful mutation.

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::BillingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingEventType {
    AccountProvisioned,
    GenerationCompleted,
    GenerationDenied,
    /// Provider call failed; no credits were debited.
    GenerationFailed,
    /// Generation succeeded but the debit lost a race and never landed.
    GenerationDebitMissed,
    WebhookApplied,
    LedgerReset,
}

impl BillingEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountProvisioned => "account_provisioned",
            Self::GenerationCompleted => "generation_completed",
            Self::GenerationDenied => "generation_denied",
            Self::GenerationFailed => "generation_failed",
            Self::GenerationDebitMissed => "generation_debit_missed",
            Self::WebhookApplied => "webhook_applied",
            Self::LedgerReset => "ledger_reset",
        }
    }
}

/// Builder for one audit record.
pub struct BillingEventBuilder {
    account_id: Option<Uuid>,
    event_type: BillingEventType,
    data: Value,
    idempotency_key: Option<String>,
}

impl BillingEventBuilder {
    pub fn new(account_id: Option<Uuid>, event_type: BillingEventType) -> Self {
        Self {
            account_id,
            event_type,
            data: Value::Object(Default::default()),
            idempotency_key: None,
        }
    }

    pub fn data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn idempotency_key(mut self, key: Option<&str>) -> Self {
        self.idempotency_key = key.map(|k| k.to_string());
        self
    }
}

#[derive(Clone)]
pub struct BillingEventLogger {
    pool: PgPool,
}

impl BillingEventLogger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn log_event(&self, event: BillingEventBuilder) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO billing_events (account_id, event_type, data, idempotency_key)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(event.account_id)
        .bind(event.event_type.as_str())
        .bind(event.data)
        .bind(event.idempotency_key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

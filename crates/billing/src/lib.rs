// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! BookshelfAI Billing Module
//!
//! Credit metering and payment reconciliation for AI generations.
//!
//! ## Features
//!
//! - **Credit Ledger**: Per-account tier and remaining-credit record
//! - **Metering Gate**: Check-then-commit debit around every generation
//! - **Webhook Ingestion**: Idempotent payment-provider callbacks
//! - **Monthly Reset**: Restores lapsed accounts to their plan limit
//! - **Audit Events**: Best-effort billing event log
//! - **Invariants**: Runnable consistency checks over the ledger

pub mod error;
pub mod events;
pub mod invariants;
pub mod ledger;
pub mod metering;
pub mod products;
pub mod reset;
pub mod webhooks;

#[cfg(test)]
mod edge_case_tests;

// Error
pub use error::{BillingError, BillingResult};

// Events
pub use events::{BillingEventBuilder, BillingEventLogger, BillingEventType};

// Invariants
pub use invariants::{
    InvariantCheckSummary, InvariantChecker, InvariantViolation, ViolationSeverity,
};

// Ledger
pub use ledger::{LedgerEntry, LedgerService};

// Metering
pub use metering::{BalanceCheck, DenialReason, MeteringGate};

// Products
pub use products::{ProductGrant, ProductMapping};

// Reset
pub use reset::{first_of_next_month, ResetService, ResetSummary};

// Webhooks
pub use webhooks::{WebhookConfig, WebhookHandler, WebhookOutcome};

use sqlx::PgPool;

/// Main billing service that combines all billing functionality
pub struct BillingService {
    pub ledger: LedgerService,
    pub metering: MeteringGate,
    pub reset: ResetService,
    pub webhooks: WebhookHandler,
    pub events: BillingEventLogger,
    pub invariants: InvariantChecker,
}

impl BillingService {
    /// Create a billing service with an explicit webhook configuration.
    pub fn new(pool: PgPool, webhook_config: WebhookConfig) -> Self {
        Self {
            ledger: LedgerService::new(pool.clone()),
            metering: MeteringGate::new(pool.clone()),
            reset: ResetService::new(pool.clone()),
            webhooks: WebhookHandler::new(pool.clone(), webhook_config),
            events: BillingEventLogger::new(pool.clone()),
            invariants: InvariantChecker::new(pool),
        }
    }

    /// Create a billing service from environment variables.
    pub fn from_env(pool: PgPool) -> Self {
        let webhook_config = WebhookConfig {
            shared_token: std::env::var("PAYMENT_WEBHOOK_TOKEN").ok(),
            products: ProductMapping::from_env(),
        };
        Self::new(pool, webhook_config)
    }
}

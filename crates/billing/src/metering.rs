//! Usage metering gate
//!
//! The authorization check and debit that wrap every AI generation request.
//! The flow is check → generate → commit: the read-only pre-check rejects
//! requests that obviously cannot afford the action before any provider call
//! is made, and the commit re-verifies the balance inside a conditional
//! UPDATE so two concurrent requests can never overdraw an account.

use bookshelf_shared::ActionType;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::ledger::LedgerService;

/// Why a generation request was denied before reaching the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No ledger entry exists; provisioning at signup was skipped.
    UsageNotInitialized,
    /// Remaining credits cannot cover the action's cost.
    MonthlyLimitReached,
}

/// Outcome of a successful balance check.
#[derive(Debug, Clone, Copy)]
pub struct BalanceCheck {
    pub remaining: i32,
    /// Unlimited tiers skip the debit entirely.
    pub unlimited: bool,
}

#[derive(Clone)]
pub struct MeteringGate {
    ledger: LedgerService,
}

impl MeteringGate {
    pub fn new(pool: PgPool) -> Self {
        Self {
            ledger: LedgerService::new(pool),
        }
    }

    /// Read-only pre-check: can this account afford `action` right now?
    ///
    /// Never mutates. A passing check is not a reservation; the commit
    /// re-verifies.
    pub async fn check_balance(
        &self,
        account_id: Uuid,
        action: ActionType,
    ) -> BillingResult<Result<BalanceCheck, DenialReason>> {
        let entry = match self.ledger.get_entry(account_id).await? {
            Some(entry) => entry,
            None => {
                tracing::warn!(account_id = %account_id, "Metering check on uninitialized account");
                return Ok(Err(DenialReason::UsageNotInitialized));
            }
        };

        if entry.tier.is_unlimited() {
            return Ok(Ok(BalanceCheck {
                remaining: entry.credits_remaining,
                unlimited: true,
            }));
        }

        let cost = action.cost();
        if entry.credits_remaining < cost {
            tracing::info!(
                account_id = %account_id,
                action = %action,
                remaining = entry.credits_remaining,
                cost = cost,
                "Generation denied: monthly limit reached"
            );
            return Ok(Err(DenialReason::MonthlyLimitReached));
        }

        Ok(Ok(BalanceCheck {
            remaining: entry.credits_remaining,
            unlimited: false,
        }))
    }

    /// Commit the debit for a completed generation.
    ///
    /// Called only after the provider returned output. For unlimited tiers
    /// this is a read of the current balance; for metered tiers it is the
    /// atomic conditional decrement. `MonthlyLimitReached` here means a
    /// concurrent request exhausted the balance between check and commit.
    pub async fn commit(&self, account_id: Uuid, action: ActionType) -> BillingResult<i32> {
        let entry = self
            .ledger
            .get_entry(account_id)
            .await?
            .ok_or(BillingError::UsageNotInitialized)?;

        if entry.tier.is_unlimited() {
            return Ok(entry.credits_remaining);
        }

        self.ledger.commit_debit(account_id, action.cost()).await
    }
}

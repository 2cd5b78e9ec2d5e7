//! Credit ledger
//!
//! The authoritative per-account record of tier and remaining credits.
//! Every mutation goes through a single SQL statement so concurrent writers
//! contend at the storage layer, never in application code.

use bookshelf_shared::SubscriptionTier;
use sqlx::PgPool;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::{BillingError, BillingResult};
use crate::reset::first_of_next_month;

/// One ledger entry, 1:1 with an account.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct LedgerEntry {
    pub account_id: Uuid,
    pub tier: SubscriptionTier,
    pub credits_remaining: i32,
    pub monthly_limit: i32,
    pub status: String,
    pub reset_date: Date,
}

/// Service owning all reads and writes of `ledger_entries`.
#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
}

impl LedgerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the free-tier entry for a freshly signed-up account.
    ///
    /// Idempotent: an existing entry is left untouched (ON CONFLICT DO
    /// NOTHING), so replays of the provisioning call are safe.
    pub async fn initialize_account(&self, account_id: Uuid) -> BillingResult<()> {
        let tier = SubscriptionTier::Free;
        let limit = tier.monthly_credits();
        let reset_date = first_of_next_month(OffsetDateTime::now_utc().date());

        let result = sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (account_id, tier, credits_remaining, monthly_limit, status, reset_date)
            VALUES ($1, $2, $3, $3, 'active', $4)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(tier)
        .bind(limit)
        .bind(reset_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            tracing::info!(account_id = %account_id, "Ledger entry created (free tier)");
        }

        Ok(())
    }

    pub async fn get_entry(&self, account_id: Uuid) -> BillingResult<Option<LedgerEntry>> {
        let entry: Option<LedgerEntry> = sqlx::query_as(
            r#"
            SELECT account_id, tier, credits_remaining, monthly_limit, status, reset_date
            FROM ledger_entries
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Atomically decrement `credits_remaining` by `cost`.
    ///
    /// The WHERE predicate re-verifies the balance at commit time, so a
    /// request that lost a race against a concurrent debit gets zero rows
    /// back and fails closed with no mutation. Unlimited tiers are excluded
    /// by the caller and never reach this statement.
    pub async fn commit_debit(&self, account_id: Uuid, cost: i32) -> BillingResult<i32> {
        let remaining: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE ledger_entries
            SET credits_remaining = credits_remaining - $2, updated_at = NOW()
            WHERE account_id = $1 AND credits_remaining >= $2
            RETURNING credits_remaining
            "#,
        )
        .bind(account_id)
        .bind(cost)
        .fetch_optional(&self.pool)
        .await?;

        match remaining {
            Some((remaining,)) => Ok(remaining),
            None => {
                // Either the entry is missing or the balance moved under us.
                if self.get_entry(account_id).await?.is_none() {
                    Err(BillingError::UsageNotInitialized)
                } else {
                    Err(BillingError::MonthlyLimitReached)
                }
            }
        }
    }

    /// Absolute set of tier and balance from an accepted payment event.
    ///
    /// Not an additive grant: re-applying the same event re-asserts the same
    /// state, which is what makes a keyless webhook retry after a 500 safe.
    pub async fn apply_grant(
        &self,
        account_id: Uuid,
        tier: SubscriptionTier,
        credits: i32,
    ) -> BillingResult<()> {
        let reset_date = first_of_next_month(OffsetDateTime::now_utc().date());

        let result = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET tier = $2,
                credits_remaining = $3,
                monthly_limit = $3,
                status = 'active',
                reset_date = $4,
                updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(tier)
        .bind(credits)
        .bind(reset_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BillingError::UsageNotInitialized);
        }

        tracing::info!(
            account_id = %account_id,
            tier = %tier,
            credits = credits,
            "Ledger grant applied"
        );

        Ok(())
    }
}

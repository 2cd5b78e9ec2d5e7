//! Monthly credit reset
//!
//! Restores every lapsed ledger entry to its plan limit and advances the
//! reset date to the first of the following month. Runs from the worker on a
//! daily trigger; safe to run any number of times in the same window because
//! an advanced reset date falls out of the selection predicate.

use sqlx::PgPool;
use time::{Date, Month, OffsetDateTime};

use crate::error::BillingResult;

/// Summary of one reset run.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ResetSummary {
    pub reset_count: u64,
}

#[derive(Clone)]
pub struct ResetService {
    pool: PgPool,
}

impl ResetService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reset every entry whose window has lapsed as of `now`.
    ///
    /// Credits restore to the plan limit, not to a carry-over; tier is never
    /// touched here.
    pub async fn run_reset(&self, now: OffsetDateTime) -> BillingResult<ResetSummary> {
        let today = now.date();
        let next_reset = first_of_next_month(today);

        let result = sqlx::query(
            r#"
            UPDATE ledger_entries
            SET credits_remaining = monthly_limit,
                reset_date = $2,
                updated_at = NOW()
            WHERE reset_date <= $1
            "#,
        )
        .bind(today)
        .bind(next_reset)
        .execute(&self.pool)
        .await?;

        let reset_count = result.rows_affected();
        if reset_count > 0 {
            tracing::info!(
                reset_count = reset_count,
                next_reset = %next_reset,
                "Monthly credit reset applied"
            );
        }

        Ok(ResetSummary { reset_count })
    }
}

/// First day of the month after `date`.
pub fn first_of_next_month(date: Date) -> Date {
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        m => (date.year(), m.next()),
    };
    // Day 1 exists in every month; the fallback is unreachable.
    Date::from_calendar_date(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn test_first_of_next_month_mid_month() {
        assert_eq!(first_of_next_month(date!(2026 - 03 - 15)), date!(2026 - 04 - 01));
    }

    #[test]
    fn test_first_of_next_month_on_the_first() {
        // An entry reset today still moves a full month out.
        assert_eq!(first_of_next_month(date!(2026 - 07 - 01)), date!(2026 - 08 - 01));
    }

    #[test]
    fn test_first_of_next_month_december_rollover() {
        assert_eq!(first_of_next_month(date!(2025 - 12 - 31)), date!(2026 - 01 - 01));
    }

    #[test]
    fn test_advanced_date_leaves_selection_window() {
        // The reset predicate is reset_date <= today; after one run the new
        // date is strictly in the future, so a second run selects nothing.
        let today = date!(2026 - 05 - 20);
        let advanced = first_of_next_month(today);
        assert!(advanced > today);
    }
}

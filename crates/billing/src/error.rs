//! Billing error types

use thiserror::Error;

pub type BillingResult<T> = Result<T, BillingError>;

#[derive(Debug, Error)]
pub enum BillingError {
    /// No ledger entry exists for the account. The gate never creates one
    /// implicitly; provisioning happens at signup.
    #[error("usage not initialized for account")]
    UsageNotInitialized,

    /// The account's remaining credits cannot cover the requested action.
    #[error("monthly credit limit reached")]
    MonthlyLimitReached,

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BillingError {
    fn from(e: sqlx::Error) -> Self {
        BillingError::Database(e.to_string())
    }
}

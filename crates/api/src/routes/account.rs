//! Account provisioning and usage endpoints

use axum::extract::State;
use axum::Json;

use bookshelf_billing::{BillingEventBuilder, BillingEventType, LedgerEntry};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /account/provision
///
/// Called once from the signup flow. Mirrors the identity-store account into
/// the local `accounts` table (the webhook path resolves buyers against it)
/// and creates the free-tier ledger entry. Safe to replay.
pub async fn provision_account(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<serde_json::Value>> {
    let email = user.email.trim().to_lowercase();

    sqlx::query(
        r#"
        INSERT INTO accounts (id, email)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user.account_id)
    .bind(&email)
    .execute(&state.pool)
    .await?;

    state
        .billing
        .ledger
        .initialize_account(user.account_id)
        .await?;

    if let Err(e) = state
        .billing
        .events
        .log_event(BillingEventBuilder::new(
            Some(user.account_id),
            BillingEventType::AccountProvisioned,
        ))
        .await
    {
        tracing::warn!(error = %e, "Failed to log provisioning event");
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /account/usage — the UI's source for tier, balance and reset date.
pub async fn get_usage(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<LedgerEntry>> {
    let entry = state
        .billing
        .ledger
        .get_entry(user.account_id)
        .await?
        .ok_or(ApiError::UsageNotInitialized)?;

    Ok(Json(entry))
}

//! HTTP routes

pub mod account;
pub mod generate;
pub mod settings;
pub mod webhook;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::state::AppState;

/// Assemble the application router.
///
/// Method filtering happens here: the webhook route only registers POST, so
/// any other verb gets a 405 before the handler runs.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks/payment", post(webhook::handle_payment_webhook))
        .route("/generate", post(generate::handle_generate))
        .route(
            "/settings/ai",
            get(settings::get_ai_settings).post(settings::save_ai_settings),
        )
        .route("/account/provision", post(account::provision_account))
        .route("/account/usage", get(account::get_usage))
        .with_state(state)
}

/// Liveness probe with a database ping.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": db_ok,
        })),
    )
}

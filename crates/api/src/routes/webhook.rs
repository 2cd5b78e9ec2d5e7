//! Payment webhook endpoint
//!
//! Thin HTTP shell over `bookshelf_billing::WebhookHandler`: pull the two
//! provider headers, hand over the raw body, map the outcome to a status
//! code. Business no-ops (duplicates, irrelevant events, unknown products,
//! unresolved buyers) are 200s so the provider stops retrying; only real
//! persistence failures return 500.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use bookshelf_billing::WebhookOutcome;

use crate::state::AppState;

pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = header_str(&headers, "x-provider-token");
    let idempotency_key = header_str(&headers, "x-provider-idempotency");

    let outcome = match state
        .billing
        .webhooks
        .handle(token, idempotency_key, &body)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            // 500 tells the provider to retry; the dedup filter and the
            // idempotent-by-value grant make that replay safe.
            tracing::error!(error = %e, "Webhook processing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal_error" })),
            )
                .into_response();
        }
    };

    let status = match &outcome {
        WebhookOutcome::Unauthorized => StatusCode::UNAUTHORIZED,
        WebhookOutcome::Malformed { .. } => StatusCode::BAD_REQUEST,
        WebhookOutcome::Duplicate { .. }
        | WebhookOutcome::IrrelevantEvent { .. }
        | WebhookOutcome::UnknownProduct { .. }
        | WebhookOutcome::AccountNotFound { .. }
        | WebhookOutcome::Applied { .. } => StatusCode::OK,
    };

    (status, Json(outcome)).into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

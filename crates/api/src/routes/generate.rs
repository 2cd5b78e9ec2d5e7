//! Generation endpoint

use axum::extract::State;
use axum::Json;
use bookshelf_shared::ActionType;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::generation::GenerationOutcome;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub action_type: ActionType,
    /// Book/library data or conversation history used to build the prompt.
    #[serde(default)]
    pub context: serde_json::Value,
}

/// POST /generate
///
/// The full metered flow runs inside this request: pre-check, provider call,
/// debit commit. A dropped connection mid-generation drops the handler and
/// therefore the debit; completion-and-delivery is what gets charged.
pub async fn handle_generate(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerationOutcome>> {
    let action: ActionType = request.action_type;

    tracing::debug!(
        account_id = %user.account_id,
        action = %action,
        "Generation requested"
    );

    let outcome = state
        .generation
        .generate(user.account_id, action, &request.context)
        .await?;

    Ok(Json(outcome))
}

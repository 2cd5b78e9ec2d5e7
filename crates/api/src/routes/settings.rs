//! AI credential settings endpoints

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::credentials::CredentialView;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SaveSettingsRequest {
    pub provider: String,
    pub api_key: String,
}

/// POST /settings/ai — save or replace the account's provider key.
pub async fn save_ai_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SaveSettingsRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let provider = request.provider.trim().to_lowercase();
    let api_key = request.api_key.trim();

    if provider.is_empty() {
        return Err(ApiError::BadRequest("provider is required".into()));
    }
    if api_key.is_empty() {
        return Err(ApiError::BadRequest("api_key is required".into()));
    }

    state
        .credentials
        .save(user.account_id, &provider, api_key)
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// GET /settings/ai — masked view only; the raw key never leaves storage.
pub async fn get_ai_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CredentialView>> {
    let view = state.credentials.get_view(user.account_id).await?;
    Ok(Json(view))
}

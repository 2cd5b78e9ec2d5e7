//! API error types
//!
//! Every denial the UI has to distinguish carries a stable machine-readable
//! reason code: "no credits left" prompts an upgrade, "provider_error"
//! prompts a retry, "missing_ai_settings" prompts adding a credential.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use bookshelf_billing::BillingError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("usage not initialized")]
    UsageNotInitialized,

    #[error("monthly credit limit reached")]
    MonthlyLimitReached,

    #[error("no AI settings configured")]
    MissingAiSettings,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::BadRequest(_) => "bad_request",
            Self::UsageNotInitialized => "usage_not_initialized",
            Self::MonthlyLimitReached => "monthly_limit_reached",
            Self::MissingAiSettings => "missing_ai_settings",
            Self::Provider(_) => "provider_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) | Self::MissingAiSettings => StatusCode::BAD_REQUEST,
            Self::UsageNotInitialized => StatusCode::FORBIDDEN,
            Self::MonthlyLimitReached => StatusCode::PAYMENT_REQUIRED,
            Self::Provider(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let message = match &self {
            // Internal details stay in the logs.
            Self::Internal(_) => None,
            Self::Provider(msg) | Self::BadRequest(msg) => Some(msg.clone()),
            _ => None,
        };

        let body = Json(serde_json::json!({
            "error": self.code(),
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(e: BillingError) -> Self {
        match e {
            BillingError::UsageNotInitialized => ApiError::UsageNotInitialized,
            BillingError::MonthlyLimitReached => ApiError::MonthlyLimitReached,
            BillingError::AccountNotFound(_) => ApiError::BadRequest("account not found".into()),
            BillingError::Database(msg) | BillingError::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

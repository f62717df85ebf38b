use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::license::LicenseError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid license key")]
    InvalidLicense,

    #[error("License key already used")]
    LicenseAlreadyUsed,

    #[error("License ledger error: {0}")]
    Ledger(String),

    #[error("PDF extraction error: {0}")]
    Pdf(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<LicenseError> for AppError {
    fn from(err: LicenseError) -> Self {
        match err {
            // Fail closed: an unreachable verifier rejects like a confirmed-invalid
            // key. The two stay distinguishable in logs (see the `license` module).
            LicenseError::InvalidKey | LicenseError::VerifierUnavailable(_) => {
                AppError::InvalidLicense
            }
            LicenseError::AlreadyUsed => AppError::LicenseAlreadyUsed,
            LicenseError::Persistence(e) => AppError::Ledger(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::InvalidLicense => (
                StatusCode::FORBIDDEN,
                "INVALID_LICENSE",
                "Invalid or refunded license key".to_string(),
            ),
            AppError::LicenseAlreadyUsed => (
                StatusCode::FORBIDDEN,
                "LICENSE_ALREADY_USED",
                "This license key has already been used".to_string(),
            ),
            AppError::Ledger(msg) => {
                tracing::error!("Ledger persistence error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LEDGER_ERROR",
                    "Could not record license consumption".to_string(),
                )
            }
            AppError::Pdf(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "PDF_ERROR",
                format!("Could not extract text from PDF: {msg}"),
            ),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Render(msg) => {
                tracing::error!("Render error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "RENDER_ERROR",
                    "Could not render the requested document".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

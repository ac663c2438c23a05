//! API error type
//!
//! Maps ledger outcomes onto HTTP statuses with a JSON body of the form
//! `{ "error": CODE, "message": ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::error::LedgerError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Ledger rejected the operation
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// No caller identity header (401)
    #[error("Missing caller identity header")]
    MissingCaller,

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Ledger(err) => {
                let status = match err {
                    LedgerError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    LedgerError::NotFound(_) | LedgerError::CategoryNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    LedgerError::AlreadyAnalyzed(_)
                    | LedgerError::RequestOutstanding { .. }
                    | LedgerError::CategoryHashCollision { .. } => StatusCode::CONFLICT,
                    LedgerError::InvalidRequest(_) | LedgerError::MalformedPayload(_) => {
                        StatusCode::BAD_REQUEST
                    }
                    LedgerError::InvalidProof(_) => StatusCode::UNAUTHORIZED,
                    LedgerError::Crypto(_) => StatusCode::BAD_GATEWAY,
                };
                (status, err.code())
            }
            ApiError::MissingCaller => (StatusCode::UNAUTHORIZED, "MISSING_CALLER"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!("API error: {}", self);
        }

        let body = Json(json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Convenience Result type for handlers
pub type ApiResult<T> = std::result::Result<T, ApiError>;

//! API error types and HTTP response conversion.
//!
//! Every error implements [`IntoResponse`] and renders as
//! `{"error": "message"}` with the appropriate status code, so handlers can
//! lean on `?` throughout.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::{error, warn};
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::db::LedgerError;

#[derive(Debug, Error, ToSchema)]
pub enum ApiError {
    /// A required request field is missing or blank. HTTP 400.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// The record has already settled and cannot be confirmed again. HTTP 400.
    #[error("Transaction already completed: {0}")]
    AlreadyCompleted(String),

    /// No ledger record for the given txid. HTTP 404.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// A ledger operation failed. HTTP 500.
    #[error("Database error: {0}")]
    DbError(String),
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::DbError(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::MissingField(field) => {
                warn!(field = field.as_str(); "API: request missing field");
                (StatusCode::BAD_REQUEST, self.to_string())
            },
            ApiError::AlreadyCompleted(txid) => {
                warn!(txid = txid.as_str(); "API: confirm on settled transaction");
                (StatusCode::BAD_REQUEST, self.to_string())
            },
            ApiError::TransactionNotFound(txid) => {
                warn!(txid = txid.as_str(); "API: transaction not found");
                (StatusCode::NOT_FOUND, self.to_string())
            },
            ApiError::DbError(e) => {
                error!(error = e.as_str(); "API: database error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            },
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

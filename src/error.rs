//! Gateway error taxonomy. Every handler returns `Result<_, GatewayError>`
//! and the `IntoResponse` impl renders the uniform JSON error envelope.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("store not found")]
    StoreNotFound,

    #[error("transaction not found")]
    TransactionNotFound,

    #[error("gateway disabled: {0}")]
    GatewayDisabled(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid card data: {0}")]
    InvalidCardData(String),

    #[error("payment declined: {error}")]
    Declined { error: String, code: String },

    #[error("transaction already refunded")]
    AlreadyRefunded,

    #[error("refund failed: {0}")]
    RefundFailed(String),

    #[error("invalid webhook signature")]
    SignatureInvalid,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::StoreNotFound | GatewayError::TransactionNotFound => {
                StatusCode::NOT_FOUND
            }
            GatewayError::GatewayDisabled(_) => StatusCode::FORBIDDEN,
            GatewayError::InvalidInput(_)
            | GatewayError::InvalidCardData(_)
            | GatewayError::Declined { .. }
            | GatewayError::AlreadyRefunded
            | GatewayError::RefundFailed(_) => StatusCode::BAD_REQUEST,
            GatewayError::SignatureInvalid => StatusCode::UNAUTHORIZED,
            GatewayError::Storage(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable code carried in the error envelope.
    pub fn code(&self) -> &str {
        match self {
            GatewayError::StoreNotFound => "store_not_found",
            GatewayError::TransactionNotFound => "transaction_not_found",
            GatewayError::GatewayDisabled(_) => "gateway_disabled",
            GatewayError::InvalidInput(_) => "invalid_input",
            GatewayError::InvalidCardData(_) => "invalid_card_data",
            GatewayError::Declined { code, .. } => code,
            GatewayError::AlreadyRefunded => "already_refunded",
            GatewayError::RefundFailed(_) => "refund_failed",
            GatewayError::SignatureInvalid => "invalid_signature",
            GatewayError::Storage(_) => "storage_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl From<RepositoryError> for GatewayError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(_) => GatewayError::TransactionNotFound,
            RepositoryError::Duplicate(id) => {
                GatewayError::Storage(format!("duplicate transaction id: {id}"))
            }
            RepositoryError::TerminalState { id, status } => GatewayError::InvalidInput(format!(
                "transaction {id} is already {status} and cannot change"
            )),
            RepositoryError::Storage(msg) => GatewayError::Storage(msg),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // server-side detail stays in the logs, not in 5xx bodies
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

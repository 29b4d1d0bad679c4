use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Insufficient funds. Available: ${available}")]
    InsufficientFunds { available: String },

    #[error("Payment provider error: {0}")]
    ExternalService(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ledger_core::Error> for ApiError {
    fn from(err: ledger_core::Error) -> Self {
        use ledger_core::Error as LedgerError;
        match err {
            LedgerError::UserNotFound(id) => ApiError::NotFound(format!("User {}", id)),
            LedgerError::DepositNotFound(invoice_id) => {
                ApiError::NotFound(format!("Deposit for invoice {}", invoice_id))
            }
            LedgerError::WithdrawalNotFound(id) => {
                ApiError::NotFound(format!("Withdrawal {}", id))
            }
            LedgerError::InsufficientFunds { available, .. } => ApiError::InsufficientFunds {
                available: available.to_string(),
            },
            LedgerError::InvalidAmount(msg) => ApiError::Validation(msg),
            LedgerError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Internal detail is logged with context and never leaks into the
        // response body
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            ApiError::ExternalService(detail) => {
                tracing::error!("Payment provider failure: {}", detail);
                "Payment provider unavailable".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(status_code).json(json!({
            "error": {
                "code": status_code.as_u16(),
                "message": message,
                "type": self.error_type()
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    fn error_type(&self) -> &str {
        match self {
            ApiError::Validation(_) => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::InsufficientFunds { .. } => "insufficient_funds",
            ApiError::ExternalService(_) => "provider_error",
            ApiError::Conflict(_) => "conflict",
            ApiError::MethodNotAllowed => "method_not_allowed",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

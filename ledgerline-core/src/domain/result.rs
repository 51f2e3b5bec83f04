//! Result and error types for the core library
//!
//! Business errors carry a stable code that callers can match on. Everything
//! else (storage, IO, configuration) collapses to `INTERNAL_ERROR` when it is
//! shown to a caller, the detail only goes to the diagnostic log.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::client::DenialReason;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    InsufficientFunds(String),

    #[error("Access denied for client {client_id}: {reason}")]
    AccessDenied { reason: DenialReason, client_id: i64 },

    #[error("Source and destination accounts must be different")]
    SameAccount,

    #[error("{0}")]
    NotReversible(String),

    #[error("{0}")]
    InvalidAmount(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Other(String),
}

/// Code reported for every non-business failure
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

const INTERNAL_MESSAGE: &str = "An internal error occurred. The operation was not applied.";

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn insufficient_funds(msg: impl Into<String>) -> Self {
        Self::InsufficientFunds(msg.into())
    }

    pub fn access_denied(reason: DenialReason, client_id: i64) -> Self {
        Self::AccessDenied { reason, client_id }
    }

    pub fn not_reversible(msg: impl Into<String>) -> Self {
        Self::NotReversible(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Stable error code for callers
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            Self::AccessDenied { .. } => "ACCESS_DENIED",
            Self::SameAccount => "SAME_ACCOUNT",
            Self::NotReversible(_) => "NOT_REVERSIBLE",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidInput(_) => "INVALID_INPUT",
            _ => INTERNAL_ERROR,
        }
    }

    /// True for the business taxonomy, false for infrastructure failures
    pub fn is_business(&self) -> bool {
        self.code() != INTERNAL_ERROR
    }

    /// Message safe to show to the caller
    pub fn user_message(&self) -> String {
        match self {
            Self::AccessDenied { reason, .. } => reason.user_message().to_string(),
            e if e.is_business() => e.to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(e: duckdb::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(format!("{:#}", e))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error handed to callers instead of a raw error value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    /// Finer grained reason, set for access denials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_code: Option<String>,
}

impl From<&Error> for ErrorResponse {
    fn from(e: &Error) -> Self {
        let detail_code = match e {
            Error::AccessDenied { reason, .. } => Some(reason.code().to_string()),
            _ => None,
        };
        Self {
            code: e.code().to_string(),
            message: e.user_message(),
            detail_code,
        }
    }
}

/// Operation result envelope used for machine-readable output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn fail(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_codes_are_stable() {
        let cases = [
            (Error::not_found("x"), "NOT_FOUND"),
            (Error::invalid_state("x"), "INVALID_STATE"),
            (Error::insufficient_funds("x"), "INSUFFICIENT_FUNDS"),
            (Error::access_denied(DenialReason::ClientBlacklisted, 1), "ACCESS_DENIED"),
            (Error::SameAccount, "SAME_ACCOUNT"),
            (Error::not_reversible("x"), "NOT_REVERSIBLE"),
            (Error::invalid_amount("x"), "INVALID_AMOUNT"),
            (Error::invalid_input("x"), "INVALID_INPUT"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
            assert!(err.is_business());
        }
    }

    #[test]
    fn test_infrastructure_errors_are_generic() {
        let err = Error::database("disk I/O error at page 42");
        assert_eq!(err.code(), INTERNAL_ERROR);
        assert!(!err.user_message().contains("page 42"));
    }

    #[test]
    fn test_error_response_carries_denial_detail() {
        let err = Error::access_denied(DenialReason::ServiceUnavailable, 7);
        let response = ErrorResponse::from(&err);
        assert_eq!(response.code, "ACCESS_DENIED");
        assert_eq!(response.detail_code.as_deref(), Some("SERVICE_UNAVAILABLE"));
        assert!(response.message.contains("temporarily unavailable"));
    }

    #[test]
    fn test_operation_result_from_result() {
        let ok: Result<i32> = Ok(42);
        let result: OperationResult<i32> = ok.into();
        assert!(result.success);
        assert_eq!(result.data, Some(42));

        let err: Result<i32> = Err(Error::SameAccount);
        let result: OperationResult<i32> = err.into();
        assert!(!result.success);
        assert_eq!(result.error.unwrap().code, "SAME_ACCOUNT");
    }
}

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tonic::{Code, Status};

/// Errors produced by the lending core.
///
/// Business-rule variants carry caller-safe messages. Infrastructure variants
/// (`Database`, `Crypto`, `Internal`) keep their detail for server-side logs
/// only; both transport boundaries replace it with a generic message.
#[derive(Debug, Error)]
pub enum LendingError {
    #[error("VALIDATION_ERR: {0}")]
    Validation(String),

    #[error("No argument given")]
    NoArgument,

    #[error("Password is too weak")]
    PasswordTooWeak,

    #[error("Malformed email")]
    MalformedEmail,

    #[error("Invalid user ID type")]
    InvalidUserIdType,

    #[error("Invalid username/password")]
    InvalidCredentials,

    #[error("Not found")]
    NotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("User is blocked/closed")]
    UserIsNotActive,

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Invalid/expired token")]
    InvalidToken(String),

    #[error("Loan not proposed")]
    LoanNotProposed,

    #[error("Loan not approved")]
    LoanNotApproved,

    #[error("Loan not fully invested")]
    LoanNotFullyInvested,

    #[error("Investment amount out of range")]
    InvestmentAmountOutOfRange,

    #[error("Concurrent update conflict, please retry")]
    TransactionConflict,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LendingError {
    /// gRPC status code for this error.
    pub fn code(&self) -> Code {
        match self {
            LendingError::Validation(_)
            | LendingError::InvalidCredentials
            | LendingError::MalformedEmail
            | LendingError::InvalidUserIdType => Code::InvalidArgument,
            LendingError::NoArgument
            | LendingError::PasswordTooWeak
            | LendingError::LoanNotProposed
            | LendingError::LoanNotApproved
            | LendingError::LoanNotFullyInvested
            | LendingError::InvestmentAmountOutOfRange => Code::FailedPrecondition,
            LendingError::NotFound | LendingError::UserNotFound => Code::NotFound,
            LendingError::UserAlreadyExists => Code::AlreadyExists,
            LendingError::PermissionDenied | LendingError::UserIsNotActive => {
                Code::PermissionDenied
            }
            LendingError::InvalidToken(_) | LendingError::Unauthenticated => Code::Unauthenticated,
            LendingError::TransactionConflict => Code::Aborted,
            LendingError::Database(_) | LendingError::Crypto(_) | LendingError::Internal(_) => {
                Code::Internal
            }
        }
    }

    /// True for infrastructure failures whose detail must not leave the
    /// service.
    pub fn is_internal(&self) -> bool {
        self.code() == Code::Internal
    }

    /// Message safe to return to a client.
    pub fn client_message(&self) -> String {
        match self {
            LendingError::InvalidToken(_) => "Invalid/expired token".to_string(),
            e if e.is_internal() => "Internal error".to_string(),
            e => e.to_string(),
        }
    }

    fn http_status(&self) -> StatusCode {
        match self.code() {
            Code::InvalidArgument => StatusCode::BAD_REQUEST,
            Code::FailedPrecondition => StatusCode::UNPROCESSABLE_ENTITY,
            Code::NotFound => StatusCode::NOT_FOUND,
            Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
            Code::PermissionDenied => StatusCode::FORBIDDEN,
            Code::Unauthenticated => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            LendingError::Validation(_) => "VALIDATION_ERROR",
            LendingError::NoArgument => "NO_ARGUMENT",
            LendingError::PasswordTooWeak => "PASSWORD_TOO_WEAK",
            LendingError::MalformedEmail => "MALFORMED_EMAIL",
            LendingError::InvalidUserIdType => "INVALID_USER_ID_TYPE",
            LendingError::InvalidCredentials => "INVALID_CREDENTIALS",
            LendingError::NotFound => "NOT_FOUND",
            LendingError::UserNotFound => "USER_NOT_FOUND",
            LendingError::UserIsNotActive => "USER_NOT_ACTIVE",
            LendingError::UserAlreadyExists => "USER_ALREADY_EXISTS",
            LendingError::PermissionDenied => "PERMISSION_DENIED",
            LendingError::Unauthenticated => "UNAUTHENTICATED",
            LendingError::InvalidToken(_) => "INVALID_TOKEN",
            LendingError::LoanNotProposed => "LOAN_NOT_PROPOSED",
            LendingError::LoanNotApproved => "LOAN_NOT_APPROVED",
            LendingError::LoanNotFullyInvested => "LOAN_NOT_FULLY_INVESTED",
            LendingError::InvestmentAmountOutOfRange => "INVESTMENT_AMOUNT_OUT_OF_RANGE",
            LendingError::TransactionConflict => "TRANSACTION_CONFLICT",
            LendingError::Database(_) | LendingError::Crypto(_) | LendingError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl From<sqlx::Error> for LendingError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // serialization_failure / deadlock_detected
            if matches!(db_err.code().as_deref(), Some("40001" | "40P01")) {
                return LendingError::TransactionConflict;
            }
        }
        LendingError::Database(err.to_string())
    }
}

impl From<JsonRejection> for LendingError {
    fn from(rejection: JsonRejection) -> Self {
        LendingError::Validation(rejection.body_text())
    }
}

impl From<LendingError> for Status {
    fn from(err: LendingError) -> Self {
        if err.is_internal() {
            tracing::error!(target: "lending.errors", error = %err, "Internal error at gRPC boundary");
        }
        crate::observability::metrics::record_rpc_error(err.code());
        Status::new(err.code(), err.client_message())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for LendingError {
    fn into_response(self) -> Response {
        if self.is_internal() {
            tracing::error!(target: "lending.errors", error = %self, "Internal error at HTTP boundary");
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.client_message(),
            },
        };

        (self.http_status(), Json(body)).into_response()
    }
}

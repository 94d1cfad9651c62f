//! Loyalty Error Types
//!
//! This module provides the domain-error variants that integrate with the
//! unified `kernel::error::AppError` system. The first six variants form the
//! closed set the retry envelope passes through untouched; everything below
//! them is either request validation (never reaches storage) or
//! infrastructure (retried).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use thiserror::Error;

/// Loyalty-specific result type alias
pub type LoyaltyResult<T> = Result<T, LoyaltyError>;

/// Loyalty-specific error variants
#[derive(Debug, Error)]
pub enum LoyaltyError {
    /// Login is already taken
    #[error("user already exists")]
    AlreadyExists,

    /// Unknown login or wrong password (single signal, no user enumeration)
    #[error("user does not exist or wrong password")]
    NotExists,

    /// This account already submitted the order number
    #[error("order already exists")]
    OrderAlreadyExists,

    /// Another account owns the order number
    #[error("order already exists for another user")]
    OtherOrderAlreadyExists,

    /// A listing came back empty
    #[error("no content")]
    EmptyData,

    /// Balance too low for the requested withdrawal
    #[error("not enough points")]
    NotEnough,

    /// No bearer token in cookie or Authorization header
    #[error("auth credentials not found")]
    AuthCredsNotFound,

    /// Bearer token failed verification
    #[error("token is not valid")]
    TokenInvalid,

    /// Request body is not parseable JSON
    #[error("request body is not valid JSON")]
    JsonParse,

    /// Login or password empty
    #[error("login and password must not be empty")]
    ValidateLogPass,

    /// Content-Type differs from what the endpoint requires
    #[error("wrong content type")]
    ContentType,

    /// Order number text is not a decimal integer
    #[error("order number is not a number")]
    OrderNotNumeric,

    /// Order number fails the Luhn mod-10 check
    #[error("order number failed the luhn check")]
    LuhnInvalid,

    /// Withdrawal order field is not a decimal integer
    #[error("withdraw order number is not valid")]
    WithdrawOrderInvalid,

    /// Withdrawal sum must be positive
    #[error("withdraw sum must be positive")]
    InvalidSum,

    /// Storage deadline elapsed before the operation finished
    #[error("storage deadline exceeded")]
    Deadline,

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Accrual service transport error
    #[error("accrual request failed: {0}")]
    Accrual(#[from] reqwest::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl LoyaltyError {
    /// Member of the closed domain-error set
    ///
    /// These are control signals, not failures: the retry envelope passes
    /// them through without consuming an attempt.
    pub fn is_domain(&self) -> bool {
        matches!(
            self,
            LoyaltyError::AlreadyExists
                | LoyaltyError::NotExists
                | LoyaltyError::OrderAlreadyExists
                | LoyaltyError::OtherOrderAlreadyExists
                | LoyaltyError::EmptyData
                | LoyaltyError::NotEnough
        )
    }

    /// Get the HTTP status code for this error
    ///
    /// `EmptyData` maps to 204 and is special-cased in `into_response`;
    /// `OrderAlreadyExists` maps to 200 on order submission, which the
    /// handler resolves before this mapping applies.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LoyaltyError::EmptyData => StatusCode::NO_CONTENT,
            LoyaltyError::AlreadyExists | LoyaltyError::OtherOrderAlreadyExists => {
                StatusCode::CONFLICT
            }
            LoyaltyError::NotExists
            | LoyaltyError::AuthCredsNotFound
            | LoyaltyError::TokenInvalid => StatusCode::UNAUTHORIZED,
            LoyaltyError::NotEnough => StatusCode::PAYMENT_REQUIRED,
            LoyaltyError::JsonParse
            | LoyaltyError::ValidateLogPass
            | LoyaltyError::ContentType
            | LoyaltyError::OrderNotNumeric => StatusCode::BAD_REQUEST,
            LoyaltyError::OrderAlreadyExists
            | LoyaltyError::LuhnInvalid
            | LoyaltyError::WithdrawOrderInvalid
            | LoyaltyError::InvalidSum => StatusCode::UNPROCESSABLE_ENTITY,
            LoyaltyError::Deadline
            | LoyaltyError::Database(_)
            | LoyaltyError::Accrual(_)
            | LoyaltyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the ErrorKind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LoyaltyError::AlreadyExists | LoyaltyError::OtherOrderAlreadyExists => {
                ErrorKind::Conflict
            }
            LoyaltyError::NotExists
            | LoyaltyError::AuthCredsNotFound
            | LoyaltyError::TokenInvalid => ErrorKind::Unauthorized,
            LoyaltyError::NotEnough => ErrorKind::PaymentRequired,
            LoyaltyError::JsonParse
            | LoyaltyError::ValidateLogPass
            | LoyaltyError::ContentType
            | LoyaltyError::OrderNotNumeric => ErrorKind::BadRequest,
            LoyaltyError::OrderAlreadyExists
            | LoyaltyError::LuhnInvalid
            | LoyaltyError::WithdrawOrderInvalid
            | LoyaltyError::InvalidSum => ErrorKind::UnprocessableEntity,
            LoyaltyError::EmptyData
            | LoyaltyError::Deadline
            | LoyaltyError::Database(_)
            | LoyaltyError::Accrual(_)
            | LoyaltyError::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// Convert to AppError
    pub fn to_app_error(&self) -> AppError {
        AppError::new(self.kind(), self.to_string())
    }

    /// Log the error with appropriate level
    ///
    /// Credentials and token contents never appear in these records.
    fn log(&self) {
        match self {
            LoyaltyError::Database(e) => {
                tracing::error!(error = %e, "Storage error");
            }
            LoyaltyError::Accrual(e) => {
                tracing::error!(error = %e, "Accrual service error");
            }
            LoyaltyError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal error");
            }
            LoyaltyError::Deadline => {
                tracing::error!("Storage deadline exceeded");
            }
            LoyaltyError::NotExists => {
                tracing::warn!("Failed login attempt");
            }
            LoyaltyError::AuthCredsNotFound | LoyaltyError::TokenInvalid => {
                tracing::warn!("Rejected unauthenticated request");
            }
            _ => {
                tracing::debug!(error = %self, "Domain error");
            }
        }
    }
}

impl IntoResponse for LoyaltyError {
    fn into_response(self) -> Response {
        self.log();
        // 204 carries no body; everything else gets the problem-details JSON
        if matches!(self, LoyaltyError::EmptyData) {
            return StatusCode::NO_CONTENT.into_response();
        }
        self.to_app_error().into_response()
    }
}

impl From<platform::token::TokenError> for LoyaltyError {
    fn from(err: platform::token::TokenError) -> Self {
        match err {
            platform::token::TokenError::Verify(_) => LoyaltyError::TokenInvalid,
            platform::token::TokenError::Sign(e) => LoyaltyError::Internal(e.to_string()),
        }
    }
}

// crates/core-lib/src/error.rs

//! Central error type for the identity and feed core.
use microfeed_common::UserId;
use thiserror::Error;

use crate::validation::ValidationError;

/// Application error types with error codes and context
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Password policy violation: {0}")]
    PolicyViolation(String),

    #[error("Feed requested for unknown viewer {0}")]
    InvalidViewer(UserId),

    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Account is already activated")]
    AlreadyActivated,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Email has already been taken")]
    EmailTaken,

    #[error("Nickname has already been taken")]
    NicknameTaken,

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Hashing error: {0}")]
    Hash(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the caller supplied bad input (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::PolicyViolation(_)
                | AppError::InvalidViewer(_)
                | AppError::AuthenticationFailure
                | AppError::TokenExpired
                | AppError::AlreadyActivated
                | AppError::Validation(_)
                | AppError::EmailTaken
                | AppError::NicknameTaken
                | AppError::UserNotFound(_)
        )
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::PolicyViolation(_) => "AUTH_001",
            AppError::AuthenticationFailure => "AUTH_002",
            AppError::Hash(_) => "AUTH_003",
            AppError::TokenExpired => "AUTH_004",
            AppError::AlreadyActivated => "AUTH_005",
            AppError::InvalidViewer(_) => "FEED_001",
            AppError::Validation(_) => "VAL_001",
            AppError::EmailTaken => "VAL_002",
            AppError::NicknameTaken => "VAL_003",
            AppError::UserNotFound(_) => "NF_001",
            AppError::Config(_) => "CFG_001",
            AppError::Io(_) => "IO_001",
            AppError::Json(_) => "JSON_001",
            AppError::Internal(_) => "INT_001",
        }
    }

    /// Get a sanitized message suitable for production use
    pub fn sanitized_message(&self) -> String {
        match self {
            AppError::PolicyViolation(reason) => format!("Password {reason}"),
            AppError::AuthenticationFailure => "Invalid email/password combination".to_string(),
            AppError::TokenExpired => "Password reset has expired".to_string(),
            AppError::AlreadyActivated => "Account is already activated".to_string(),
            AppError::InvalidViewer(_) => "Unknown user".to_string(),
            AppError::Validation(err) => err.to_string(),
            AppError::EmailTaken => "Email has already been taken".to_string(),
            AppError::NicknameTaken => "Nickname has already been taken".to_string(),
            AppError::UserNotFound(_) => "Resource not found".to_string(),
            AppError::Hash(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Json(_)
            | AppError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<scrypt::password_hash::Error> for AppError {
    fn from(err: scrypt::password_hash::Error) -> Self {
        AppError::Hash(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Worker task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_app_error_display() {
        let err = AppError::PolicyViolation("is too short (minimum is 6 characters)".to_string());
        assert_eq!(
            err.to_string(),
            "Password policy violation: is too short (minimum is 6 characters)"
        );

        let err = AppError::InvalidViewer(UserId(99));
        assert_eq!(err.to_string(), "Feed requested for unknown viewer 99");

        let io_error = AppError::Io(IoError::new(ErrorKind::NotFound, "File not found"));
        assert!(io_error.to_string().contains("IO error"));
    }

    #[test]
    fn test_app_error_error_codes() {
        assert_eq!(AppError::PolicyViolation(String::new()).error_code(), "AUTH_001");
        assert_eq!(AppError::AuthenticationFailure.error_code(), "AUTH_002");
        assert_eq!(AppError::InvalidViewer(UserId(1)).error_code(), "FEED_001");
        assert_eq!(AppError::EmailTaken.error_code(), "VAL_002");
        assert_eq!(AppError::TokenExpired.error_code(), "AUTH_004");

        let json_err: serde_json::Error =
            serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        assert_eq!(AppError::Json(json_err).error_code(), "JSON_001");
    }

    #[test]
    fn test_client_errors_are_distinguished() {
        assert!(AppError::InvalidViewer(UserId(3)).is_client_error());
        assert!(AppError::PolicyViolation("is blank".to_string()).is_client_error());
        assert!(AppError::TokenExpired.is_client_error());
        assert!(!AppError::Internal("boom".to_string()).is_client_error());
        assert!(!AppError::Hash("bad params".to_string()).is_client_error());
    }

    #[test]
    fn test_sanitized_messages_hide_internals() {
        let err = AppError::Internal("disk path /var/lib/secret".to_string());
        assert_eq!(err.sanitized_message(), "An internal error occurred");

        let err = AppError::AuthenticationFailure;
        assert_eq!(err.sanitized_message(), "Invalid email/password combination");
    }

    #[test]
    fn test_error_from_impls() {
        let io_err = IoError::new(ErrorKind::PermissionDenied, "Permission denied");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));

        let val_err = ValidationError::InvalidEmail("is invalid".to_string());
        let app_err: AppError = val_err.into();
        assert!(matches!(app_err, AppError::Validation(_)));
    }
}

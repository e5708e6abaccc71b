//! Error types module
//!
//! All failures that cross a crate boundary are unified under [`AppError`]. The
//! taxonomy is deliberately small: not-found, invalid-argument (with a
//! machine-readable sub-code) and internal failures of the database, storage
//! backend or runtime.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "FILE_TOO_BIG")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden from clients
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Sub-codes carried by [`AppError::InvalidArgument`].
///
/// The numeric values are part of the public API and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidArgumentCode {
    FileTooBig,
    FileHasZeroSize,
    UnsupportedFileType,
    InvalidRange,
}

impl InvalidArgumentCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidArgumentCode::FileTooBig => "FILE_TOO_BIG",
            InvalidArgumentCode::FileHasZeroSize => "FILE_HAS_ZERO_SIZE",
            InvalidArgumentCode::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            InvalidArgumentCode::InvalidRange => "INVALID_RANGE",
        }
    }

    pub fn numeric(&self) -> u16 {
        match self {
            InvalidArgumentCode::FileTooBig => 601,
            InvalidArgumentCode::FileHasZeroSize => 602,
            InvalidArgumentCode::UnsupportedFileType => 603,
            InvalidArgumentCode::InvalidRange => 604,
        }
    }
}

impl Display for InvalidArgumentCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Numeric code reported for a missing file.
pub const FILE_NOT_FOUND_CODE: u16 = 600;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{reason}")]
    InvalidArgument {
        code: InvalidArgumentCode,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn invalid_argument(code: InvalidArgumentCode, reason: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            code,
            reason: reason.into(),
        }
    }

    /// Sub-code of an invalid-argument error, if any.
    pub fn invalid_argument_code(&self) -> Option<InvalidArgumentCode> {
        match self {
            AppError::InvalidArgument { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidArgument { code, .. } => match code {
            InvalidArgumentCode::FileTooBig => (
                413,
                code.as_str(),
                false,
                Some("Reduce file size and try again"),
                false,
                LogLevel::Debug,
            ),
            InvalidArgumentCode::FileHasZeroSize => (
                400,
                code.as_str(),
                false,
                Some("Send a non-empty request body"),
                false,
                LogLevel::Debug,
            ),
            InvalidArgumentCode::UnsupportedFileType => (
                400,
                code.as_str(),
                false,
                Some("Upload a file of an allowed content type"),
                false,
                LogLevel::Debug,
            ),
            InvalidArgumentCode::InvalidRange => (
                416,
                code.as_str(),
                false,
                Some("Request a byte range inside the file"),
                false,
                LogLevel::Debug,
            ),
        },
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "FILE_NOT_FOUND",
            false,
            Some("Verify the category and filename"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::InvalidArgument { .. } => "InvalidArgument",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Legacy numeric code for not-found and invalid-argument errors.
    pub fn numeric_code(&self) -> Option<u16> {
        match self {
            AppError::NotFound(_) => Some(FILE_NOT_FOUND_CODE),
            AppError::InvalidArgument { code, .. } => Some(code.numeric()),
            _ => None,
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::InvalidArgument { reason, .. } => reason.clone(),
            AppError::InvalidInput(ref msg) => msg.clone(),
            AppError::NotFound(_) => "file not found".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_database() {
        #[cfg(feature = "sqlx")]
        let err = AppError::from(sqlx::Error::PoolClosed);
        #[cfg(not(feature = "sqlx"))]
        let err = AppError::Database("pool closed".to_string());
        assert_eq!(err.http_status_code(), 500);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Failed to access database");
    }

    #[test]
    fn test_invalid_argument_codes() {
        let too_big = AppError::invalid_argument(InvalidArgumentCode::FileTooBig, "too big");
        assert_eq!(too_big.http_status_code(), 413);
        assert_eq!(too_big.error_code(), "FILE_TOO_BIG");
        assert_eq!(too_big.numeric_code(), Some(601));
        assert_eq!(too_big.client_message(), "too big");

        let empty = AppError::invalid_argument(InvalidArgumentCode::FileHasZeroSize, "empty");
        assert_eq!(empty.http_status_code(), 400);
        assert_eq!(empty.numeric_code(), Some(602));

        let range = AppError::invalid_argument(InvalidArgumentCode::InvalidRange, "bad range");
        assert_eq!(range.http_status_code(), 416);
        assert_eq!(range.numeric_code(), Some(604));
        assert_eq!(
            range.invalid_argument_code(),
            Some(InvalidArgumentCode::InvalidRange)
        );
    }

    #[test]
    fn test_not_found_metadata() {
        let err = AppError::NotFound("avatars/abc".to_string());
        assert_eq!(err.http_status_code(), 404);
        assert_eq!(err.error_code(), "FILE_NOT_FOUND");
        assert_eq!(err.numeric_code(), Some(600));
        assert!(!err.is_recoverable());
        assert!(err.is_not_found());
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err = AppError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(err.http_status_code(), 500);
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.detailed_message().contains("disk on fire"));
    }
}

//! Unified application error types for ObjMeta.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Callers only ever need to look at
//! [`AppError::status`], which folds every kind into the four outcomes a
//! transport can report.

use std::fmt;
use thiserror::Error;

/// Error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested folder or file does not exist.
    NotFound,
    /// The caller supplied an unusable argument (unknown driver, bad TLS options).
    InvalidArgument,
    /// The operation did not complete within its deadline.
    DeadlineExceeded,
    /// An internal error occurred.
    Internal,
    /// The database backend reported a failure.
    Database,
    /// Configuration could not be loaded or parsed.
    Configuration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            Self::DeadlineExceeded => write!(f, "DEADLINE_EXCEEDED"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
        }
    }
}

/// Outcome classes visible at the repository boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum StatusCode {
    /// Lookup miss or a delete that affected no rows.
    NotFound,
    /// Unsupported driver or malformed TLS configuration.
    InvalidArgument,
    /// The bounded deadline elapsed.
    DeadlineExceeded,
    /// Everything else.
    Internal,
}

impl ErrorKind {
    /// Fold this kind into its boundary status.
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NotFound,
            Self::InvalidArgument | Self::Configuration => StatusCode::InvalidArgument,
            Self::DeadlineExceeded => StatusCode::DeadlineExceeded,
            Self::Internal | Self::Database => StatusCode::Internal,
        }
    }
}

/// The unified application error used throughout ObjMeta.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message naming the operation and key.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create a deadline-exceeded error.
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeadlineExceeded, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// The boundary status for this error.
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

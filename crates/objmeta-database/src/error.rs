//! Mapping of sqlx failures into [`AppError`].

use objmeta_core::error::{AppError, ErrorKind};

/// Wrap a sqlx error with an operation message.
///
/// Pool checkout timeouts surface as `DeadlineExceeded`; everything else
/// is a backend failure. The SQL text never ends up in the message.
pub fn database_error(message: impl Into<String>, err: sqlx::Error) -> AppError {
    let kind = match err {
        sqlx::Error::PoolTimedOut => ErrorKind::DeadlineExceeded,
        _ => ErrorKind::Database,
    };
    AppError::with_source(kind, message, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use objmeta_core::error::StatusCode;

    #[test]
    fn test_pool_timeout_is_deadline() {
        let err = database_error("Failed to find folder", sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
        assert_eq!(err.status(), StatusCode::DeadlineExceeded);
    }

    #[test]
    fn test_other_failures_are_internal() {
        let err = database_error("Failed to find folder", sqlx::Error::PoolClosed);
        assert_eq!(err.kind, ErrorKind::Database);
        assert_eq!(err.status(), StatusCode::Internal);
        assert_eq!(err.message, "Failed to find folder");
    }
}

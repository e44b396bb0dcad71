//! Deadline-bound database sessions.
//!
//! Every repository call runs inside a [`Session`]. When the deadline
//! passes the in-flight future is dropped, which drops any open sqlx
//! transaction and rolls it back before the connection returns to the
//! pool.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::warn;

use objmeta_core::error::AppError;
use objmeta_core::result::AppResult;

/// A request-scoped handle bound to a deadline.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    timeout: Duration,
    deadline: Instant,
}

impl Session {
    /// Start a session that expires `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
        }
    }

    /// The timeout this session was created with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drive `fut` to completion or fail with `DeadlineExceeded`.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout_at(self.deadline, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Database operation exceeded its deadline"
                );
                Err(AppError::deadline_exceeded(format!(
                    "{operation} did not complete within {}ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objmeta_core::error::ErrorKind;

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline() {
        let session = Session::new(Duration::from_secs(20));
        let value = session
            .run("get modification time", async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(42_i64)
            })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_hits_deadline() {
        let started = Instant::now();
        let session = Session::new(Duration::from_secs(20));
        let err = session
            .run("set modification time", std::future::pending::<AppResult<()>>())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
        assert!(err.message.contains("set modification time"));
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_error_is_passed_through() {
        let session = Session::new(Duration::from_secs(1));
        let err = session
            .run("remove metadata", async {
                Err::<(), _>(AppError::not_found("missing"))
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_work_on_deadline() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let session = Session::new(Duration::from_secs(1));
        let result = session
            .run("sweep", async move {
                tokio::time::sleep(Duration::from_secs(2)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_err());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!finished.load(Ordering::SeqCst));
    }
}

//! Transaction helper shared by both backends.

use futures::future::BoxFuture;
use sqlx::{Database, Pool, Transaction};
use tracing::{error, warn};

use objmeta_core::result::AppResult;

use crate::error::database_error;

/// Run `work` inside a transaction.
///
/// Commits when `work` succeeds; otherwise rolls back and returns the
/// original error. If the surrounding future is dropped (deadline, caller
/// cancellation) the transaction is dropped uncommitted and sqlx rolls it
/// back when the connection is released.
pub async fn with_transaction<DB, T, F>(pool: &Pool<DB>, operation: &str, work: F) -> AppResult<T>
where
    DB: Database,
    T: Send,
    F: for<'t> FnOnce(&'t mut Transaction<'static, DB>) -> BoxFuture<'t, AppResult<T>> + Send,
{
    let mut tx = pool.begin().await.map_err(|e| {
        database_error(format!("Failed to begin transaction for {operation}"), e)
    })?;

    match work(&mut tx).await {
        Ok(value) => {
            tx.commit().await.map_err(|e| {
                database_error(format!("Failed to commit transaction for {operation}"), e)
            })?;
            Ok(value)
        }
        Err(err) => {
            error!(operation, error = %err, "Unable to execute transaction");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(operation, error = %rollback_err, "Failed to roll back transaction");
            }
            Err(err)
        }
    }
}

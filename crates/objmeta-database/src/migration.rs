//! Database schema lifecycle: apply, inspect, and reset migrations.
//!
//! Each backend has its own reversible migration set under
//! `migrations/<backend>` at the workspace root.

use sqlx::migrate::{Migrate, Migrator};
use tracing::{info, warn};

use objmeta_core::error::{AppError, ErrorKind};
use objmeta_core::result::AppResult;

use crate::connection::{BackendPool, DatabasePool};

static POSTGRES_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/postgres");
static MYSQL_MIGRATOR: Migrator = sqlx::migrate!("../../migrations/mysql");

/// One migration and whether it has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    /// Schema version.
    pub version: i64,
    /// Human-readable description.
    pub description: String,
    /// Whether the migration is recorded as applied.
    pub applied: bool,
}

fn migrator_for(db: &DatabasePool) -> &'static Migrator {
    match db.pool() {
        BackendPool::Postgres(_) => &POSTGRES_MIGRATOR,
        BackendPool::MySql(_) => &MYSQL_MIGRATOR,
    }
}

/// The latest schema version this build knows about.
pub fn latest_version(db: &DatabasePool) -> i64 {
    migrator_for(db)
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| m.version)
        .max()
        .unwrap_or(0)
}

/// Run all pending database migrations. Safe to call on every startup.
pub async fn run_migrations(db: &DatabasePool) -> AppResult<()> {
    info!(driver = %db.driver(), "Running database migrations...");

    let result = match db.pool() {
        BackendPool::Postgres(pool) => POSTGRES_MIGRATOR.run(pool).await,
        BackendPool::MySql(pool) => MYSQL_MIGRATOR.run(pool).await,
    };
    result.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to run migrations: {e}"),
            e,
        )
    })?;

    info!(
        version = latest_version(db),
        "Database migrations completed successfully"
    );
    Ok(())
}

/// Roll back every migration and apply them again. All data is lost.
pub async fn reset_database(db: &DatabasePool) -> AppResult<()> {
    warn!(driver = %db.driver(), "Resetting database schema, all data will be lost");

    let result = match db.pool() {
        BackendPool::Postgres(pool) => POSTGRES_MIGRATOR.undo(pool, 0).await,
        BackendPool::MySql(pool) => MYSQL_MIGRATOR.undo(pool, 0).await,
    };
    result.map_err(|e| {
        AppError::with_source(
            ErrorKind::Database,
            format!("Failed to roll back migrations: {e}"),
            e,
        )
    })?;

    info!("All migrations rolled back");
    run_migrations(db).await
}

/// Report every known migration and whether it has been applied.
pub async fn migration_status(db: &DatabasePool) -> AppResult<Vec<MigrationState>> {
    let applied = match db.pool() {
        BackendPool::Postgres(pool) => {
            let mut conn = pool.acquire().await.map_err(status_error)?;
            conn.ensure_migrations_table().await.map_err(migrate_error)?;
            conn.list_applied_migrations().await.map_err(migrate_error)?
        }
        BackendPool::MySql(pool) => {
            let mut conn = pool.acquire().await.map_err(status_error)?;
            conn.ensure_migrations_table().await.map_err(migrate_error)?;
            conn.list_applied_migrations().await.map_err(migrate_error)?
        }
    };

    Ok(migrator_for(db)
        .iter()
        .filter(|m| m.migration_type.is_up_migration())
        .map(|m| MigrationState {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.iter().any(|a| a.version == m.version),
        })
        .collect())
}

fn status_error(e: sqlx::Error) -> AppError {
    crate::error::database_error("Failed to read migration status", e)
}

fn migrate_error(e: sqlx::migrate::MigrateError) -> AppError {
    AppError::with_source(
        ErrorKind::Database,
        format!("Failed to read migration status: {e}"),
        e,
    )
}

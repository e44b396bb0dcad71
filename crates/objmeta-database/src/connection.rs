//! Connection pool management for the supported backends.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{info, warn};

use objmeta_core::config::DatabaseConfig;
use objmeta_core::error::{AppError, ErrorKind};
use objmeta_core::result::AppResult;

use crate::error::database_error;
use crate::session::Session;
use crate::tls::MySqlTlsProfile;

/// Supported relational backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseDriver {
    /// PostgreSQL-family engines.
    Postgres,
    /// MySQL-family engines (MySQL, MariaDB).
    MySql,
}

impl FromStr for DatabaseDriver {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySql),
            other => Err(AppError::invalid_argument(format!(
                "Unsupported database driver {other:?}"
            ))),
        }
    }
}

impl fmt::Display for DatabaseDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
        }
    }
}

/// The backend-specific sqlx pool.
#[derive(Debug, Clone)]
pub enum BackendPool {
    /// PostgreSQL pool.
    Postgres(PgPool),
    /// MySQL pool.
    MySql(MySqlPool),
}

/// The store engine: one live pool plus the default query deadline.
///
/// Constructed once at startup and passed explicitly to the repository
/// and the reclaimer. Clones share the same underlying pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: BackendPool,
    query_timeout: Duration,
}

impl DatabasePool {
    /// Open a pool for the configured driver and verify connectivity.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let driver: DatabaseDriver = config.driver.parse()?;

        info!(
            driver = %driver,
            dsn = %mask_password(&config.dsn),
            max_connections = config.max_connections,
            idle_timeout_seconds = config.idle_timeout_seconds,
            "Connecting to database"
        );

        let pool = match driver {
            DatabaseDriver::Postgres => BackendPool::Postgres(connect_postgres(config).await?),
            DatabaseDriver::MySql => BackendPool::MySql(connect_mysql(config).await?),
        };

        let db = Self {
            pool,
            query_timeout: Duration::from_secs(config.query_timeout_seconds.max(1)),
        };
        db.health_check().await?;

        info!(driver = %driver, "Successfully connected to database");
        Ok(db)
    }

    /// The driver backing this pool.
    pub fn driver(&self) -> DatabaseDriver {
        match self.pool {
            BackendPool::Postgres(_) => DatabaseDriver::Postgres,
            BackendPool::MySql(_) => DatabaseDriver::MySql,
        }
    }

    /// Return a reference to the underlying backend pool.
    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    /// The default deadline for point operations.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Start a session bound to `timeout`.
    pub fn session(&self, timeout: Duration) -> Session {
        Session::new(timeout)
    }

    /// Start a session bound to the default query timeout.
    pub fn default_session(&self) -> Session {
        self.session(self.query_timeout)
    }

    /// Liveness probe.
    pub async fn health_check(&self) -> AppResult<()> {
        self.default_session()
            .run("health check", async {
                let result = match &self.pool {
                    BackendPool::Postgres(pool) => {
                        sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
                    }
                    BackendPool::MySql(pool) => {
                        sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
                    }
                };
                result
                    .map_err(|e| database_error("Health check failed", e))
            })
            .await
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        match &self.pool {
            BackendPool::Postgres(pool) => pool.close().await,
            BackendPool::MySql(pool) => pool.close().await,
        }
        info!("Database pool closed");
    }
}

async fn connect_postgres(config: &DatabaseConfig) -> AppResult<PgPool> {
    if config.tls.is_some() || config.custom_tls.as_deref().is_some_and(|s| !s.is_empty()) {
        warn!("TLS options only apply to the mysql driver, ignoring them");
    }

    let options = PgConnectOptions::from_str(&config.dsn).map_err(|e| {
        AppError::with_source(ErrorKind::InvalidArgument, "Invalid PostgreSQL DSN", e)
    })?;

    PgPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| database_error(format!("Failed to connect to database: {e}"), e))
}

async fn connect_mysql(config: &DatabaseConfig) -> AppResult<MySqlPool> {
    let mut options = MySqlConnectOptions::from_str(&config.dsn).map_err(|e| {
        AppError::with_source(ErrorKind::InvalidArgument, "Invalid MySQL DSN", e)
    })?;

    if let Some(profile) = MySqlTlsProfile::from_config(config)? {
        options = profile.apply(options);
    }

    MySqlPoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
        .connect_with(options)
        .await
        .map_err(|e| database_error(format!("Failed to connect to database: {e}"), e))
}

/// Mask the password portion of a database URL for safe logging.
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}

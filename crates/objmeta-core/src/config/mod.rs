//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! an optional TOML file, environment variables prefixed with `OBJMETA`,
//! and explicit command-line overrides (highest precedence).

pub mod database;
pub mod logging;
pub mod reclaimer;

use serde::{Deserialize, Serialize};

pub use self::database::{DatabaseConfig, TlsConfig};
pub use self::logging::LoggingConfig;
pub use self::reclaimer::ReclaimerConfig;

use crate::error::AppError;

/// Default configuration file, loaded when present.
pub const DEFAULT_CONFIG_FILE: &str = "config/default";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,
    /// Orphan folder reclamation settings.
    #[serde(default)]
    pub reclaimer: ReclaimerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Values supplied on the command line that take precedence over files
/// and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Database driver identifier.
    pub driver: Option<String>,
    /// Data source name.
    pub dsn: Option<String>,
    /// Legacy MySQL TLS query string.
    pub custom_tls: Option<String>,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Sources, lowest precedence first: `config/default.toml` (optional),
    /// the explicit `path` (required when given), `OBJMETA__*` environment
    /// variables, and `overrides`.
    pub fn load(path: Option<&str>, overrides: &ConfigOverrides) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("OBJMETA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.driver", overrides.driver.clone())?
            .set_override_option("database.dsn", overrides.dsn.clone())?
            .set_override_option("database.custom_tls", overrides.custom_tls.clone())?
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

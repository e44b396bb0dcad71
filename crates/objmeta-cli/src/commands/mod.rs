//! CLI command definitions and dispatch.

pub mod metadata;
pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use objmeta_core::config::{AppConfig, ConfigOverrides};
use objmeta_core::error::AppError;
use objmeta_database::DatabasePool;

/// ObjMeta: object modification-time metadata store
#[derive(Debug, Parser)]
#[command(name = "objmeta", version, about, long_about = None)]
pub struct Cli {
    /// Path to a configuration file (TOML)
    #[arg(short, long, env = "OBJMETA_CONFIG")]
    pub config: Option<String>,

    /// Database driver: postgres or mysql
    #[arg(long, env = "OBJMETA_DRIVER")]
    pub driver: Option<String>,

    /// Database connection string
    #[arg(long, env = "OBJMETA_DSN", hide_env_values = true)]
    pub dsn: Option<String>,

    /// MySQL TLS options as a query string
    /// (root_cert=...&client_cert=...&client_key=...&tls_mode=1)
    #[arg(long, env = "OBJMETA_CUSTOM_TLS")]
    pub custom_tls: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the metadata store until Ctrl+C
    Serve(serve::ServeArgs),
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Read and write object metadata
    Metadata(metadata::MetadataArgs),
}

impl Cli {
    /// Load configuration with command-line values taking precedence.
    pub fn load_config(&self) -> Result<AppConfig, AppError> {
        let overrides = ConfigOverrides {
            driver: self.driver.clone(),
            dsn: self.dsn.clone(),
            custom_tls: self.custom_tls.clone(),
        };
        AppConfig::load(self.config.as_deref(), &overrides)
    }

    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Serve(args) => serve::execute(args, config).await,
            Commands::Migrate(args) => migrate::execute(args, &config, self.format).await,
            Commands::Metadata(args) => metadata::execute(args, &config, self.format).await,
        }
    }
}

/// Helper: open a pool for one-shot commands
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}

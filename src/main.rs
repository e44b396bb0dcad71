//! ObjMeta Server: object modification-time metadata store.
//!
//! Loads configuration, initializes logging, then runs the store (pool,
//! migrations, orphan reclaimer) until Ctrl+C or SIGTERM.

use tracing_subscriber::{EnvFilter, fmt};

use objmeta_core::config::{AppConfig, ConfigOverrides, LoggingConfig};
use objmeta_core::error::AppError;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.logging);
    tracing::info!("Starting ObjMeta v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = objmeta_worker::serve(&config, objmeta_worker::shutdown_signal()).await {
        tracing::error!(error = %e, status = ?e.status(), "Server error");
        std::process::exit(1);
    }
}

/// Load configuration from `OBJMETA_CONFIG` (when set), the default file,
/// and the environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let config_path = std::env::var("OBJMETA_CONFIG").ok();
    AppConfig::load(config_path.as_deref(), &ConfigOverrides::default())
}

/// Initialize tracing/logging
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

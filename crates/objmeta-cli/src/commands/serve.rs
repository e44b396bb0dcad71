//! Run the metadata store.

use clap::Args;

use objmeta_core::config::AppConfig;
use objmeta_core::error::AppError;

/// Arguments for the serve command
#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Do not start the orphan folder reclaimer
    #[arg(long)]
    pub no_reclaimer: bool,

    /// Override the reclaimer period in seconds
    #[arg(long)]
    pub reclaim_interval: Option<u64>,
}

/// Execute the serve command
pub async fn execute(args: &ServeArgs, mut config: AppConfig) -> Result<(), AppError> {
    if args.no_reclaimer {
        config.reclaimer.enabled = false;
    }
    if let Some(seconds) = args.reclaim_interval {
        config.reclaimer.interval_seconds = seconds;
    }

    tracing::info!(
        driver = %config.database.driver,
        reclaimer = config.reclaimer.enabled,
        interval_secs = config.reclaimer.interval().as_secs(),
        "Starting ObjMeta v{}",
        env!("CARGO_PKG_VERSION")
    );

    objmeta_worker::serve(&config, objmeta_worker::shutdown_signal()).await
}

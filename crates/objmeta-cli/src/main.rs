//! ObjMeta CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{Cli, Commands};
use objmeta_core::config::LoggingConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("Failed to load configuration: {e}"));
            std::process::exit(1);
        }
    };

    // Admin commands stay quiet unless RUST_LOG asks otherwise.
    let default_level = match cli.command {
        Commands::Serve(_) => config.logging.level.clone(),
        _ => "warn".to_string(),
    };
    init_logging(&config.logging, &default_level);

    if let Err(e) = cli.execute(config).await {
        output::print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn init_logging(logging: &LoggingConfig, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

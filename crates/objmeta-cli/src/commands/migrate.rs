//! Database migration management commands.

use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use objmeta_core::config::AppConfig;
use objmeta_core::error::AppError;
use objmeta_database::migration;

/// Arguments for the migrate command
#[derive(Debug, Args)]
pub struct MigrateArgs {
    /// Migration subcommand
    #[command(subcommand)]
    pub command: MigrateCommand,
}

/// Migration subcommands
#[derive(Debug, Subcommand)]
pub enum MigrateCommand {
    /// Apply all pending migrations and exit
    Run,
    /// Show migration status
    Status,
    /// Reset database (roll back every migration and re-run them)
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

/// Migration status row
#[derive(Debug, Serialize, Tabled)]
struct MigrationRow {
    /// Schema version
    version: i64,
    /// Description
    description: String,
    /// Applied or pending
    status: String,
}

/// Execute migration commands
pub async fn execute(
    args: &MigrateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    if let MigrateCommand::Reset { force: false } = args.command {
        let confirm = dialoguer::Confirm::new()
            .with_prompt("This will DROP all metadata tables and re-run migrations. Continue?")
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {e}")))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let pool = super::connect(config).await?;

    let result = match &args.command {
        MigrateCommand::Run => {
            println!("Running database migrations...");
            migration::run_migrations(&pool).await.map(|()| {
                output::print_success(&format!(
                    "Schema is at version {}.",
                    migration::latest_version(&pool)
                ));
            })
        }
        MigrateCommand::Status => migration::migration_status(&pool).await.map(|states| {
            let rows: Vec<MigrationRow> = states
                .into_iter()
                .map(|s| MigrationRow {
                    version: s.version,
                    description: s.description,
                    status: if s.applied { "applied" } else { "pending" }.to_string(),
                })
                .collect();
            output::print_list(&rows, format);
        }),
        MigrateCommand::Reset { .. } => {
            println!("Resetting database...");
            migration::reset_database(&pool)
                .await
                .map(|()| output::print_success("Database reset complete."))
        }
    };

    pool.close().await;
    result
}

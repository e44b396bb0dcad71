//! Metadata administration commands. Each maps to one store operation.

use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use objmeta_core::config::AppConfig;
use objmeta_core::error::AppError;
use objmeta_core::traits::{MetadataStore, OrphanSweeper};
use objmeta_database::MetadataRepository;

/// Arguments for metadata commands
#[derive(Debug, Args)]
pub struct MetadataArgs {
    /// Metadata subcommand
    #[command(subcommand)]
    pub command: MetadataCommand,
}

/// Metadata subcommands
#[derive(Debug, Subcommand)]
pub enum MetadataCommand {
    /// Record the modification time of an object
    Set {
        /// Storage identifier
        #[arg(short, long)]
        storage_id: String,
        /// Object path
        path: String,
        /// Milliseconds since the epoch (defaults to now)
        #[arg(short, long)]
        mtime: Option<i64>,
    },
    /// Show the modification time of an object
    Get {
        /// Storage identifier
        #[arg(short, long)]
        storage_id: String,
        /// Object path
        path: String,
    },
    /// List modification times of every object in a folder
    List {
        /// Storage identifier
        #[arg(short, long)]
        storage_id: String,
        /// Folder path
        folder: String,
    },
    /// Remove the metadata of an object
    Remove {
        /// Storage identifier
        #[arg(short, long)]
        storage_id: String,
        /// Object path
        path: String,
    },
    /// List folder paths in ascending order
    Folders {
        /// Storage identifier (omit for all storages)
        #[arg(short, long, default_value = "")]
        storage_id: String,
        /// Maximum number of folders (0 for no limit)
        #[arg(short, long, default_value = "0")]
        limit: u32,
        /// Only list paths after this one
        #[arg(long, default_value = "")]
        start_after: String,
    },
    /// Delete folders that no longer contain any object
    Reclaim,
}

/// Object display row
#[derive(Debug, Serialize, Tabled)]
struct ObjectRow {
    /// Object name or path
    name: String,
    /// Milliseconds since the epoch
    last_modified: i64,
    /// RFC 3339 timestamp
    modified_at: String,
}

impl ObjectRow {
    fn new(name: String, last_modified: i64) -> Self {
        let modified_at = DateTime::<Utc>::from_timestamp_millis(last_modified)
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        Self {
            name,
            last_modified,
            modified_at,
        }
    }
}

/// Folder display row
#[derive(Debug, Serialize, Tabled)]
struct FolderRow {
    /// Folder path
    path: String,
}

/// Execute metadata commands
pub async fn execute(
    args: &MetadataArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let pool = super::connect(config).await?;
    let repo = MetadataRepository::new(&pool);

    let result = run(&repo, &args.command, format).await;

    pool.close().await;
    result
}

async fn run(
    repo: &MetadataRepository,
    command: &MetadataCommand,
    format: OutputFormat,
) -> Result<(), AppError> {
    match command {
        MetadataCommand::Set {
            storage_id,
            path,
            mtime,
        } => {
            let mtime = mtime.unwrap_or_else(|| Utc::now().timestamp_millis());
            repo.set_modification_time(storage_id, path, mtime).await?;
            output::print_success(&format!("Recorded {path} at {mtime}"));
        }
        MetadataCommand::Get { storage_id, path } => {
            let mtime = repo.get_modification_time(storage_id, path).await?;
            output::print_item(&ObjectRow::new(path.clone(), mtime), format);
        }
        MetadataCommand::List { storage_id, folder } => {
            let times = repo.get_modification_times(storage_id, folder).await?;
            let mut rows: Vec<ObjectRow> = times
                .into_iter()
                .map(|(name, mtime)| ObjectRow::new(name, mtime))
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            output::print_list(&rows, format);
        }
        MetadataCommand::Remove { storage_id, path } => {
            repo.remove_metadata(storage_id, path).await?;
            output::print_success(&format!("Removed {path}"));
        }
        MetadataCommand::Folders {
            storage_id,
            limit,
            start_after,
        } => {
            let rows: Vec<FolderRow> = repo
                .get_folders(storage_id, *limit, start_after)
                .await?
                .into_iter()
                .map(|path| FolderRow { path })
                .collect();
            output::print_list(&rows, format);
        }
        MetadataCommand::Reclaim => {
            let removed = repo.remove_unreferenced_folders().await?;
            output::print_success(&format!("Removed {removed} unreferenced folder(s)"));
        }
    }

    Ok(())
}

//! Metadata store abstractions.
//!
//! A transport adapter holds an `Arc<dyn MetadataStore>` and maps each
//! request onto exactly one call, translating [`AppError::status`]
//! into its own status codes.
//!
//! [`AppError::status`]: crate::error::AppError::status

use std::collections::HashMap;

use async_trait::async_trait;

use crate::result::AppResult;

/// The five metadata operations exposed to callers.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Record `mtime` (milliseconds since the epoch) for `object_path`,
    /// creating the folder record on first use and overwriting any
    /// previous timestamp for the same path.
    async fn set_modification_time(
        &self,
        storage_id: &str,
        object_path: &str,
        mtime: i64,
    ) -> AppResult<()>;

    /// Return the stored timestamp for `object_path`, or `NotFound`.
    async fn get_modification_time(&self, storage_id: &str, object_path: &str) -> AppResult<i64>;

    /// Return every `name -> timestamp` pair directly under
    /// `folder_path`. An unknown folder yields an empty map.
    async fn get_modification_times(
        &self,
        storage_id: &str,
        folder_path: &str,
    ) -> AppResult<HashMap<String, i64>>;

    /// Delete the metadata for `object_path`, or fail with `NotFound`.
    /// The folder record is left for the reclaimer.
    async fn remove_metadata(&self, storage_id: &str, object_path: &str) -> AppResult<()>;

    /// List folder paths in ascending order.
    ///
    /// An empty `storage_id` lists every storage, an empty `start_after`
    /// starts from the beginning, and a `limit` of 0 is unbounded.
    async fn get_folders(
        &self,
        storage_id: &str,
        limit: u32,
        start_after: &str,
    ) -> AppResult<Vec<String>>;
}

/// Bulk removal of folders that no file references.
#[async_trait]
pub trait OrphanSweeper: Send + Sync {
    /// Delete every orphan folder and return how many were removed.
    async fn remove_unreferenced_folders(&self) -> AppResult<u64>;
}

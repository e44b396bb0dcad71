//! Statement-level operations each SQL backend provides.

use std::fmt::Debug;

use async_trait::async_trait;

use objmeta_core::object_path::ObjectLocation;
use objmeta_core::result::AppResult;
use objmeta_entity::file::File;
use objmeta_entity::folder::Folder;

/// One backend's SQL for the metadata tables.
///
/// Implementations never apply deadlines themselves; the repository wraps
/// every call in a [`Session`](crate::session::Session).
#[async_trait]
pub(crate) trait MetadataBackend: Send + Sync + Debug {
    /// Insert-or-ignore the folder, then upsert the file, in one transaction.
    async fn upsert_file(
        &self,
        storage_id: &str,
        location: &ObjectLocation,
        mtime: i64,
    ) -> AppResult<()>;

    async fn find_folder(&self, storage_id: &str, path: &str) -> AppResult<Option<Folder>>;

    async fn find_file(&self, folder_id: i64, name: &str) -> AppResult<Option<File>>;

    async fn list_files(&self, folder_id: i64) -> AppResult<Vec<File>>;

    /// Returns the number of rows deleted.
    async fn delete_file(&self, folder_id: i64, name: &str) -> AppResult<u64>;

    /// Ascending folder paths. Empty `storage_id` and `start_after` mean
    /// no filter; `limit` 0 means unbounded.
    async fn list_folder_paths(
        &self,
        storage_id: &str,
        limit: u32,
        start_after: &str,
    ) -> AppResult<Vec<String>>;

    /// Delete every folder with no file rows in one statement.
    async fn delete_unreferenced_folders(&self) -> AppResult<u64>;
}

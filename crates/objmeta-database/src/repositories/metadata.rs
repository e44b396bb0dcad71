//! Metadata repository: the five store operations plus the orphan sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use objmeta_core::error::AppError;
use objmeta_core::object_path::{ObjectLocation, normalize_folder};
use objmeta_core::result::AppResult;
use objmeta_core::traits::{MetadataStore, OrphanSweeper};

use super::backend::MetadataBackend;
use super::mysql::MySqlBackend;
use super::postgres::PostgresBackend;
use crate::connection::{BackendPool, DatabasePool};
use crate::session::Session;

/// Bulk operations get this many multiples of the point-query timeout.
pub const SWEEP_TIMEOUT_MULTIPLIER: u32 = 4;

/// Repository over the `metadata_folders` / `metadata_files` tables.
///
/// Holds no mutable state of its own; concurrent folder creation is
/// serialized by the backend's unique keys.
#[derive(Debug, Clone)]
pub struct MetadataRepository {
    backend: Arc<dyn MetadataBackend>,
    query_timeout: Duration,
}

impl MetadataRepository {
    /// Create a repository on top of an open pool.
    pub fn new(db: &DatabasePool) -> Self {
        let backend: Arc<dyn MetadataBackend> = match db.pool() {
            BackendPool::Postgres(pool) => Arc::new(PostgresBackend::new(pool.clone())),
            BackendPool::MySql(pool) => Arc::new(MySqlBackend::new(pool.clone())),
        };
        Self::with_backend(backend, db.query_timeout())
    }

    pub(crate) fn with_backend(backend: Arc<dyn MetadataBackend>, query_timeout: Duration) -> Self {
        Self {
            backend,
            query_timeout,
        }
    }

    /// The deadline applied to point operations.
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// The deadline applied to bulk listing and the orphan sweep.
    pub fn sweep_timeout(&self) -> Duration {
        self.query_timeout * SWEEP_TIMEOUT_MULTIPLIER
    }

    fn session(&self) -> Session {
        Session::new(self.query_timeout)
    }

    fn bulk_session(&self) -> Session {
        Session::new(self.sweep_timeout())
    }
}

#[async_trait]
impl MetadataStore for MetadataRepository {
    async fn set_modification_time(
        &self,
        storage_id: &str,
        object_path: &str,
        mtime: i64,
    ) -> AppResult<()> {
        let location = ObjectLocation::parse(object_path);
        debug!(
            storage_id,
            folder = %location.folder,
            name = %location.name,
            mtime,
            "Setting modification time"
        );

        self.session()
            .run(
                "set modification time",
                self.backend.upsert_file(storage_id, &location, mtime),
            )
            .await
    }

    async fn get_modification_time(&self, storage_id: &str, object_path: &str) -> AppResult<i64> {
        let location = ObjectLocation::parse(object_path);

        self.session()
            .run("get modification time", async {
                let not_found = || {
                    AppError::not_found(format!(
                        "No modification time for {object_path:?} in storage {storage_id:?}"
                    ))
                };

                let folder = self
                    .backend
                    .find_folder(storage_id, &location.folder)
                    .await?
                    .ok_or_else(not_found)?;
                let file = self
                    .backend
                    .find_file(folder.id, &location.name)
                    .await?
                    .ok_or_else(not_found)?;
                Ok(file.last_modified)
            })
            .await
    }

    async fn get_modification_times(
        &self,
        storage_id: &str,
        folder_path: &str,
    ) -> AppResult<HashMap<String, i64>> {
        let folder_path = normalize_folder(folder_path);

        self.bulk_session()
            .run("get modification times", async {
                let Some(folder) = self.backend.find_folder(storage_id, &folder_path).await?
                else {
                    debug!(storage_id, folder = %folder_path, "Folder not found, returning no entries");
                    return Ok(HashMap::new());
                };

                let files = self.backend.list_files(folder.id).await?;
                Ok(files
                    .into_iter()
                    .map(|f| (f.name, f.last_modified))
                    .collect())
            })
            .await
    }

    async fn remove_metadata(&self, storage_id: &str, object_path: &str) -> AppResult<()> {
        let location = ObjectLocation::parse(object_path);

        self.session()
            .run("remove metadata", async {
                let not_found = || {
                    AppError::not_found(format!(
                        "No metadata for {object_path:?} in storage {storage_id:?}"
                    ))
                };

                let folder = self
                    .backend
                    .find_folder(storage_id, &location.folder)
                    .await?
                    .ok_or_else(not_found)?;

                let deleted = self.backend.delete_file(folder.id, &location.name).await?;
                if deleted == 0 {
                    return Err(not_found());
                }

                debug!(storage_id, path = object_path, "Removed metadata");
                Ok(())
            })
            .await
    }

    async fn get_folders(
        &self,
        storage_id: &str,
        limit: u32,
        start_after: &str,
    ) -> AppResult<Vec<String>> {
        self.session()
            .run(
                "get folders",
                self.backend.list_folder_paths(storage_id, limit, start_after),
            )
            .await
    }
}

#[async_trait]
impl OrphanSweeper for MetadataRepository {
    async fn remove_unreferenced_folders(&self) -> AppResult<u64> {
        let removed = self
            .bulk_session()
            .run(
                "remove unreferenced folders",
                self.backend.delete_unreferenced_folders(),
            )
            .await?;

        debug!(rows = removed, "Removed unreferenced folders");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use objmeta_core::error::ErrorKind;
    use objmeta_entity::file::File;
    use objmeta_entity::folder::Folder;

    /// In-memory backend with the same key semantics as the SQL tables.
    #[derive(Debug, Default)]
    struct MemoryBackend {
        state: Mutex<MemoryState>,
    }

    #[derive(Debug, Default)]
    struct MemoryState {
        next_id: i64,
        folders: BTreeMap<(String, String), i64>,
        files: BTreeMap<(i64, String), i64>,
    }

    #[async_trait]
    impl MetadataBackend for MemoryBackend {
        async fn upsert_file(
            &self,
            storage_id: &str,
            location: &ObjectLocation,
            mtime: i64,
        ) -> AppResult<()> {
            let mut state = self.state.lock().unwrap();
            let key = (storage_id.to_string(), location.folder.clone());
            let folder_id = match state.folders.get(&key) {
                Some(id) => *id,
                None => {
                    state.next_id += 1;
                    let id = state.next_id;
                    state.folders.insert(key, id);
                    id
                }
            };
            state
                .files
                .insert((folder_id, location.name.clone()), mtime);
            Ok(())
        }

        async fn find_folder(&self, storage_id: &str, path: &str) -> AppResult<Option<Folder>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .folders
                .get(&(storage_id.to_string(), path.to_string()))
                .map(|id| Folder {
                    id: *id,
                    path: path.to_string(),
                    storage_id: storage_id.to_string(),
                }))
        }

        async fn find_file(&self, folder_id: i64, name: &str) -> AppResult<Option<File>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .files
                .get(&(folder_id, name.to_string()))
                .map(|mtime| File {
                    id: 0,
                    name: name.to_string(),
                    last_modified: *mtime,
                    folder_id,
                }))
        }

        async fn list_files(&self, folder_id: i64) -> AppResult<Vec<File>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .files
                .iter()
                .filter(|((id, _), _)| *id == folder_id)
                .map(|((id, name), mtime)| File {
                    id: 0,
                    name: name.clone(),
                    last_modified: *mtime,
                    folder_id: *id,
                })
                .collect())
        }

        async fn delete_file(&self, folder_id: i64, name: &str) -> AppResult<u64> {
            let mut state = self.state.lock().unwrap();
            Ok(u64::from(
                state.files.remove(&(folder_id, name.to_string())).is_some(),
            ))
        }

        async fn list_folder_paths(
            &self,
            storage_id: &str,
            limit: u32,
            start_after: &str,
        ) -> AppResult<Vec<String>> {
            let state = self.state.lock().unwrap();
            let mut paths: Vec<String> = state
                .folders
                .keys()
                .filter(|(sid, _)| storage_id.is_empty() || sid == storage_id)
                .filter(|(_, path)| start_after.is_empty() || path.as_str() > start_after)
                .map(|(_, path)| path.clone())
                .collect();
            paths.sort();
            if limit > 0 {
                paths.truncate(limit as usize);
            }
            Ok(paths)
        }

        async fn delete_unreferenced_folders(&self) -> AppResult<u64> {
            let mut state = self.state.lock().unwrap();
            let referenced: Vec<i64> = state.files.keys().map(|(id, _)| *id).collect();
            let before = state.folders.len();
            state.folders.retain(|_, id| referenced.contains(id));
            Ok((before - state.folders.len()) as u64)
        }
    }

    /// Backend whose calls never complete.
    #[derive(Debug)]
    struct StalledBackend;

    #[async_trait]
    impl MetadataBackend for StalledBackend {
        async fn upsert_file(&self, _: &str, _: &ObjectLocation, _: i64) -> AppResult<()> {
            std::future::pending().await
        }
        async fn find_folder(&self, _: &str, _: &str) -> AppResult<Option<Folder>> {
            std::future::pending().await
        }
        async fn find_file(&self, _: i64, _: &str) -> AppResult<Option<File>> {
            std::future::pending().await
        }
        async fn list_files(&self, _: i64) -> AppResult<Vec<File>> {
            std::future::pending().await
        }
        async fn delete_file(&self, _: i64, _: &str) -> AppResult<u64> {
            std::future::pending().await
        }
        async fn list_folder_paths(&self, _: &str, _: u32, _: &str) -> AppResult<Vec<String>> {
            std::future::pending().await
        }
        async fn delete_unreferenced_folders(&self) -> AppResult<u64> {
            std::future::pending().await
        }
    }

    fn repository() -> MetadataRepository {
        MetadataRepository::with_backend(
            Arc::new(MemoryBackend::default()),
            Duration::from_secs(20),
        )
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let repo = repository();
        repo.set_modification_time("s3://b", "/u/f1/a.txt", 1000)
            .await
            .unwrap();
        assert_eq!(
            repo.get_modification_time("s3://b", "/u/f1/a.txt")
                .await
                .unwrap(),
            1000
        );

        repo.set_modification_time("s3://b", "/u/f1/a.txt", 1100)
            .await
            .unwrap();
        assert_eq!(
            repo.get_modification_time("s3://b", "/u/f1/a.txt")
                .await
                .unwrap(),
            1100
        );
        assert_eq!(
            repo.get_folders("s3://b", 0, "").await.unwrap(),
            vec!["/u/f1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_equivalent_paths_share_a_record() {
        let repo = repository();
        repo.set_modification_time("s", "a//b/./c.txt", 5).await.unwrap();
        assert_eq!(repo.get_modification_time("s", "a/b/c.txt").await.unwrap(), 5);
        let times = repo.get_modification_times("s", "a/b/").await.unwrap();
        assert_eq!(times.get("c.txt"), Some(&5));
    }

    #[tokio::test]
    async fn test_missing_folder_and_missing_file_are_both_not_found() {
        let repo = repository();
        let err = repo.get_modification_time("s", "/x/y.txt").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.contains("/x/y.txt"));

        repo.set_modification_time("s", "/x/z.txt", 1).await.unwrap();
        let err = repo.get_modification_time("s", "/x/y.txt").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_remove_metadata() {
        let repo = repository();
        let err = repo.remove_metadata("s", "/never/written").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        repo.set_modification_time("s", "/d/a", 1).await.unwrap();
        let err = repo.remove_metadata("s", "/d/b").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        repo.remove_metadata("s", "/d/a").await.unwrap();
        let err = repo.get_modification_time("s", "/d/a").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);

        // The emptied folder stays until the sweep runs.
        assert_eq!(repo.get_folders("s", 0, "").await.unwrap(), vec!["/d"]);
        assert_eq!(repo.remove_unreferenced_folders().await.unwrap(), 1);
        assert!(repo.get_folders("s", 0, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_folder_lists_empty() {
        let repo = repository();
        assert!(
            repo.get_modification_times("s", "/nothing/here")
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_storage_isolation() {
        let repo = repository();
        repo.set_modification_time("one", "/a/f", 1).await.unwrap();
        repo.set_modification_time("two", "/a/f", 2).await.unwrap();

        repo.remove_metadata("one", "/a/f").await.unwrap();
        repo.remove_unreferenced_folders().await.unwrap();

        assert_eq!(repo.get_modification_time("two", "/a/f").await.unwrap(), 2);
        assert_eq!(repo.get_folders("two", 0, "").await.unwrap(), vec!["/a"]);
        assert!(repo.get_folders("one", 0, "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_folder_argument_is_cleaned() {
        let repo = repository();
        repo.set_modification_time("s", "top.txt", 3).await.unwrap();
        repo.set_modification_time("s", "/u/f1/a.txt", 4).await.unwrap();

        let times = repo.get_modification_times("s", "").await.unwrap();
        assert_eq!(times.get("top.txt"), Some(&3));
        let times = repo.get_modification_times("s", "/u/f1/").await.unwrap();
        assert_eq!(times.get("a.txt"), Some(&4));
        let times = repo.get_modification_times("s", "/u//f1/.").await.unwrap();
        assert_eq!(times.len(), 1);
    }

    #[tokio::test]
    async fn test_trailing_slash_names_last_element() {
        let repo = repository();
        repo.set_modification_time("s", "/a/b/", 9).await.unwrap();
        assert_eq!(repo.get_folders("s", 0, "").await.unwrap(), vec!["/a/b"]);
        assert_eq!(repo.get_modification_time("s", "/a/b/b").await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_empty_storage_id_lists_every_storage() {
        let repo = repository();
        repo.set_modification_time("one", "/b/x", 1).await.unwrap();
        repo.set_modification_time("two", "/a/x", 2).await.unwrap();
        repo.set_modification_time("two", "/c/x", 3).await.unwrap();

        assert_eq!(
            repo.get_folders("", 0, "").await.unwrap(),
            vec!["/a", "/b", "/c"]
        );
        assert_eq!(repo.get_folders("", 0, "/a").await.unwrap(), vec!["/b", "/c"]);
        assert_eq!(repo.get_folders("two", 0, "").await.unwrap(), vec!["/a", "/c"]);
    }

    #[tokio::test]
    async fn test_limit_caps_the_page() {
        let repo = repository();
        for i in 0..5 {
            repo.set_modification_time("s", &format!("/d{i}/f"), i)
                .await
                .unwrap();
        }

        assert_eq!(repo.get_folders("s", 2, "").await.unwrap(), vec!["/d0", "/d1"]);
        assert_eq!(repo.get_folders("s", 2, "/d3").await.unwrap(), vec!["/d4"]);
        assert!(repo.get_folders("s", 2, "/d4").await.unwrap().is_empty());
        assert_eq!(repo.get_folders("s", 0, "").await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_keyset_walk_matches_full_listing() {
        let repo = repository();
        for i in 0..23 {
            repo.set_modification_time("s", &format!("/p/{i:02}/obj"), i)
                .await
                .unwrap();
        }
        repo.set_modification_time("s", "root-level", 1).await.unwrap();
        repo.set_modification_time("other", "/p/99/obj", 1)
            .await
            .unwrap();

        let all = repo.get_folders("s", 0, "").await.unwrap();
        assert_eq!(all.len(), 24);
        assert_eq!(all[0], ".");
        assert!(all.windows(2).all(|w| w[0] < w[1]));

        let mut walked = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = repo.get_folders("s", 7, &cursor).await.unwrap();
            if page.is_empty() {
                break;
            }
            assert!(page.len() <= 7);
            cursor = page[page.len() - 1].clone();
            walked.extend(page);
        }
        assert_eq!(walked, all);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_backend_hits_deadline() {
        let repo =
            MetadataRepository::with_backend(Arc::new(StalledBackend), Duration::from_secs(20));

        let err = repo.set_modification_time("s", "/a/b", 1).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
        assert!(err.message.contains("20000ms"));

        let err = repo.remove_unreferenced_folders().await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeadlineExceeded);
        assert!(err.message.contains("80000ms"));
    }

    #[test]
    fn test_sweep_timeout_is_four_times_query_timeout() {
        let repo = repository();
        assert_eq!(repo.sweep_timeout(), Duration::from_secs(80));
    }
}

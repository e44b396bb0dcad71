//! MySQL statements for the metadata tables.
//!
//! `path` and `name` are `TEXT` with a binary collation; uniqueness rides
//! on stored SHA-256 columns (`path_hash`, `name_hash`). Text columns are
//! read back through `CAST(... AS CHAR)` so they decode as strings
//! regardless of the column's binary collation flag.

use async_trait::async_trait;
use sqlx::{MySql, MySqlConnection, MySqlPool, QueryBuilder};

use objmeta_core::error::AppError;
use objmeta_core::object_path::ObjectLocation;
use objmeta_core::result::AppResult;
use objmeta_entity::file::File;
use objmeta_entity::folder::Folder;

use super::backend::MetadataBackend;
use crate::error::database_error;
use crate::transaction::with_transaction;

// LAST_INSERT_ID(id) makes the duplicate branch report the existing id.
const INSERT_FOLDER: &str = "INSERT INTO metadata_folders (path, storage_id) VALUES (?, ?) \
     ON DUPLICATE KEY UPDATE id = LAST_INSERT_ID(id)";

const LOCK_FOLDER_ID: &str = "SELECT id FROM metadata_folders \
     WHERE storage_id = ? AND path_hash = UNHEX(SHA2(?, 256)) AND path = ? LOCK IN SHARE MODE";

const SELECT_FOLDER: &str = "SELECT id, CAST(path AS CHAR) AS path, \
     CAST(storage_id AS CHAR) AS storage_id FROM metadata_folders \
     WHERE storage_id = ? AND path_hash = UNHEX(SHA2(?, 256)) AND path = ?";

const UPSERT_FILE: &str = "INSERT INTO metadata_files (name, last_modified, folder_id) \
     VALUES (?, ?, ?) ON DUPLICATE KEY UPDATE last_modified = VALUES(last_modified)";

const SELECT_FILE: &str = "SELECT id, CAST(name AS CHAR) AS name, last_modified, folder_id \
     FROM metadata_files WHERE folder_id = ? AND name_hash = UNHEX(SHA2(?, 256)) AND name = ?";

const SELECT_FILES: &str = "SELECT id, CAST(name AS CHAR) AS name, last_modified, folder_id \
     FROM metadata_files WHERE folder_id = ?";

const DELETE_FILE: &str = "DELETE FROM metadata_files \
     WHERE folder_id = ? AND name_hash = UNHEX(SHA2(?, 256)) AND name = ?";

const DELETE_UNREFERENCED_FOLDERS: &str = "DELETE FROM metadata_folders WHERE NOT EXISTS \
     (SELECT 1 FROM metadata_files WHERE metadata_files.folder_id = metadata_folders.id)";

#[derive(Debug, Clone)]
pub(crate) struct MySqlBackend {
    pool: MySqlPool,
}

impl MySqlBackend {
    pub(crate) fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Insert the folder if absent and return its id.
async fn ensure_folder(
    conn: &mut MySqlConnection,
    storage_id: &str,
    path: &str,
) -> AppResult<i64> {
    let result = sqlx::query(INSERT_FOLDER)
        .bind(path)
        .bind(storage_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            database_error(
                format!("Failed to insert folder {path:?} for storage {storage_id:?}"),
                e,
            )
        })?;

    let id = result.last_insert_id();
    if id > 0 {
        return i64::try_from(id)
            .map_err(|_| AppError::internal(format!("Folder id {id} out of range")));
    }

    let existing: Option<i64> = sqlx::query_scalar(LOCK_FOLDER_ID)
        .bind(storage_id)
        .bind(path)
        .bind(path)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            database_error(
                format!("Failed to resolve folder {path:?} for storage {storage_id:?}"),
                e,
            )
        })?;

    existing.ok_or_else(|| {
        AppError::internal(format!(
            "Folder {path:?} for storage {storage_id:?} vanished during insert"
        ))
    })
}

#[async_trait]
impl MetadataBackend for MySqlBackend {
    async fn upsert_file(
        &self,
        storage_id: &str,
        location: &ObjectLocation,
        mtime: i64,
    ) -> AppResult<()> {
        let storage_id = storage_id.to_string();
        let folder = location.folder.clone();
        let name = location.name.clone();

        with_transaction(&self.pool, "set modification time", move |tx| {
            Box::pin(async move {
                let folder_id = ensure_folder(&mut **tx, &storage_id, &folder).await?;

                sqlx::query(UPSERT_FILE)
                    .bind(&name)
                    .bind(mtime)
                    .bind(folder_id)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        database_error(
                            format!("Failed to upsert file {name:?} in folder {folder:?}"),
                            e,
                        )
                    })?;
                Ok(())
            })
        })
        .await
    }

    async fn find_folder(&self, storage_id: &str, path: &str) -> AppResult<Option<Folder>> {
        sqlx::query_as::<_, Folder>(SELECT_FOLDER)
            .bind(storage_id)
            .bind(path)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                database_error(
                    format!("Failed to find folder {path:?} for storage {storage_id:?}"),
                    e,
                )
            })
    }

    async fn find_file(&self, folder_id: i64, name: &str) -> AppResult<Option<File>> {
        sqlx::query_as::<_, File>(SELECT_FILE)
            .bind(folder_id)
            .bind(name)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database_error(format!("Failed to find file {name:?}"), e))
    }

    async fn list_files(&self, folder_id: i64) -> AppResult<Vec<File>> {
        sqlx::query_as::<_, File>(SELECT_FILES)
            .bind(folder_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database_error(format!("Failed to list files of folder {folder_id}"), e))
    }

    async fn delete_file(&self, folder_id: i64, name: &str) -> AppResult<u64> {
        sqlx::query(DELETE_FILE)
            .bind(folder_id)
            .bind(name)
            .bind(name)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| database_error(format!("Failed to delete file {name:?}"), e))
    }

    async fn list_folder_paths(
        &self,
        storage_id: &str,
        limit: u32,
        start_after: &str,
    ) -> AppResult<Vec<String>> {
        // Qualified ORDER BY so the binary-collated column sorts, not the alias.
        let mut builder: QueryBuilder<'_, MySql> = QueryBuilder::new(
            "SELECT CAST(metadata_folders.path AS CHAR) AS path FROM metadata_folders",
        );
        let mut separator = " WHERE ";
        if !storage_id.is_empty() {
            builder
                .push(separator)
                .push("metadata_folders.storage_id = ")
                .push_bind(storage_id);
            separator = " AND ";
        }
        if !start_after.is_empty() {
            builder
                .push(separator)
                .push("metadata_folders.path > ")
                .push_bind(start_after);
        }
        builder.push(" ORDER BY metadata_folders.path ASC");
        if limit > 0 {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                database_error(format!("Failed to list folders for storage {storage_id:?}"), e)
            })
    }

    async fn delete_unreferenced_folders(&self) -> AppResult<u64> {
        sqlx::query(DELETE_UNREFERENCED_FOLDERS)
            .execute(&self.pool)
            .await
            .map(|r| r.rows_affected())
            .map_err(|e| database_error("Failed to remove unreferenced folders", e))
    }
}

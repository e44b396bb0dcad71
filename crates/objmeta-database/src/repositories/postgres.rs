//! PostgreSQL statements for the metadata tables.
//!
//! Uniqueness is enforced by expression indexes over `md5(path)` and
//! `md5(name)`, so conflict targets name the expression and every lookup
//! compares the hash (to hit the index) and the full string.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use objmeta_core::error::AppError;
use objmeta_core::object_path::ObjectLocation;
use objmeta_core::result::AppResult;
use objmeta_entity::file::File;
use objmeta_entity::folder::Folder;

use super::backend::MetadataBackend;
use crate::error::database_error;
use crate::transaction::with_transaction;

const INSERT_FOLDER: &str = "INSERT INTO metadata_folders (path, storage_id) VALUES ($1, $2) \
     ON CONFLICT (storage_id, (md5(path))) DO NOTHING RETURNING id";

const SELECT_FOLDER_ID: &str = "SELECT id FROM metadata_folders \
     WHERE storage_id = $1 AND md5(path) = md5($2) AND path = $2";

const SELECT_FOLDER: &str = "SELECT id, path, storage_id FROM metadata_folders \
     WHERE storage_id = $1 AND md5(path) = md5($2) AND path = $2";

const UPSERT_FILE: &str = "INSERT INTO metadata_files (name, last_modified, folder_id) \
     VALUES ($1, $2, $3) \
     ON CONFLICT (folder_id, (md5(name))) DO UPDATE SET last_modified = EXCLUDED.last_modified";

const SELECT_FILE: &str = "SELECT id, name, last_modified, folder_id FROM metadata_files \
     WHERE folder_id = $1 AND md5(name) = md5($2) AND name = $2";

const SELECT_FILES: &str =
    "SELECT id, name, last_modified, folder_id FROM metadata_files WHERE folder_id = $1";

const DELETE_FILE: &str =
    "DELETE FROM metadata_files WHERE folder_id = $1 AND md5(name) = md5($2) AND name = $2";

const DELETE_UNREFERENCED_FOLDERS: &str = "DELETE FROM metadata_folders WHERE NOT EXISTS \
     (SELECT 1 FROM metadata_files WHERE metadata_files.folder_id = metadata_folders.id)";

#[derive(Debug, Clone)]
pub(crate) struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Insert the folder if absent and return its id.
async fn ensure_folder(conn: &mut PgConnection, storage_id: &str, path: &str) -> AppResult<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(INSERT_FOLDER)
        .bind(path)
        .bind(storage_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            database_error(
                format!("Failed to insert folder {path:?} for storage {storage_id:?}"),
                e,
            )
        })?;

    if let Some(id) = inserted {
        return Ok(id);
    }

    // Lost the race or the folder already existed; the committed row wins.
    let existing: Option<i64> = sqlx::query_scalar(SELECT_FOLDER_ID)
        .bind(storage_id)
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
impl MetadataBackend for PostgresBackend {
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
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT path FROM metadata_folders");
        let mut separator = " WHERE ";
        if !storage_id.is_empty() {
            builder.push(separator).push("storage_id = ").push_bind(storage_id);
            separator = " AND ";
        }
        if !start_after.is_empty() {
            builder.push(separator).push("path > ").push_bind(start_after);
        }
        builder.push(" ORDER BY path ASC");
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

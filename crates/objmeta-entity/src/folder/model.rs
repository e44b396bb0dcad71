//! Folder entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A deduplicated directory path scoped by storage identifier.
///
/// `(path, storage_id)` is unique. Folders are created lazily by the first
/// write beneath them and removed only by the orphan sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Folder {
    /// Surrogate key assigned on insert.
    pub id: i64,
    /// Normalized folder path.
    pub path: String,
    /// Opaque storage identifier.
    pub storage_id: String,
}

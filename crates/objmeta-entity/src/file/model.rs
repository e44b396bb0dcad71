//! File entity model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A tracked object: base name, modification time, and owning folder.
///
/// `(name, folder_id)` is unique; `last_modified` is the only column that
/// changes after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct File {
    /// Surrogate key assigned on insert.
    pub id: i64,
    /// Final path component of the object.
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    /// Owning folder.
    pub folder_id: i64,
}

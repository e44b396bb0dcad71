//! Object path normalization.
//!
//! Object storage keys are flat strings. Metadata is stored as a folder
//! record plus a file record, so every key is split lexically into the
//! folder part and the final component. The split never looks at the
//! storage identifier: `(storage_id, folder)` is the folder key and the
//! two are always carried side by side.

use serde::{Deserialize, Serialize};

/// Folder path used for objects that have no directory component.
pub const RELATIVE_ROOT: &str = ".";

/// Folder path used for objects directly under `/`.
pub const ABSOLUTE_ROOT: &str = "/";

/// An object path split into its folder and file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocation {
    /// Normalized folder path.
    pub folder: String,
    /// Final path component.
    pub name: String,
}

impl ObjectLocation {
    /// Split an object path into `(folder, name)`.
    ///
    /// The split happens at the last `/`. Only the folder part is cleaned
    /// (repeated separators collapsed, `.` and `..` resolved lexically), so
    /// `a//b/./c.txt` and `a/b/c.txt` land in the same folder. The name is
    /// the last element once trailing slashes are dropped: `/a/b/` is
    /// `("/a/b", "b")` and `a/b/..` is `("a/b", "..")`. Total: every input
    /// yields a location.
    pub fn parse(object_path: &str) -> Self {
        Self {
            folder: dir(object_path),
            name: base(object_path),
        }
    }
}

/// Everything before the last `/`, cleaned.
fn dir(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => clean(&path[..=idx]),
        None => RELATIVE_ROOT.to_string(),
    }
}

/// The last element of the path, ignoring trailing slashes.
fn base(path: &str) -> String {
    if path.is_empty() {
        return RELATIVE_ROOT.to_string();
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return ABSOLUTE_ROOT.to_string();
    }
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Normalize a folder path the same way [`ObjectLocation::parse`]
/// normalizes the folder part of an object path.
pub fn normalize_folder(folder_path: &str) -> String {
    clean(folder_path)
}

/// Lexically clean a slash-separated path.
///
/// Returns `.` for an empty relative result and `/` for an empty rooted
/// one. `..` never climbs above the root of a rooted path.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return RELATIVE_ROOT.to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        RELATIVE_ROOT.to_string()
    } else {
        joined
    }
}

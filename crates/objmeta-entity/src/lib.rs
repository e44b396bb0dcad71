//! # objmeta-entity
//!
//! Row models for the two metadata tables. Every struct derives `Debug`,
//! `Clone`, `Serialize`, `Deserialize` and `sqlx::FromRow`, and decodes
//! from either supported backend.

pub mod file;
pub mod folder;

pub use file::File;
pub use folder::Folder;

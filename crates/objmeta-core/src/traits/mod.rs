//! Core trait definitions shared across ObjMeta crates.

pub mod metadata;

pub use metadata::{MetadataStore, OrphanSweeper};

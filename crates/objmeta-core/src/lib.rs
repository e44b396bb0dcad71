//! # objmeta-core
//!
//! Core crate for ObjMeta. Contains the store traits, configuration
//! schemas, the object path normalizer, and the unified error system.
//!
//! This crate has **no** internal dependencies on other ObjMeta crates.

pub mod config;
pub mod error;
pub mod object_path;
pub mod result;
pub mod traits;

pub use error::AppError;
pub use object_path::ObjectLocation;
pub use result::AppResult;

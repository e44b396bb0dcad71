//! Metadata repository and its per-backend SQL implementations.

mod backend;
pub mod metadata;
mod mysql;
mod postgres;

pub use metadata::{MetadataRepository, SWEEP_TIMEOUT_MULTIPLIER};

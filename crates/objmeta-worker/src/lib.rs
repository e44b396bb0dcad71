//! Background processing for ObjMeta.
//!
//! This crate provides:
//! - The orphan folder reclaimer, a fixed-period sweep of folders no file
//!   references
//! - The service entry point that wires the pool, migrations, repository,
//!   and reclaimer together and runs until shutdown

pub mod reclaimer;
pub mod service;

pub use reclaimer::{OrphanReclaimer, ReclaimerHandle};
pub use service::{Service, serve, shutdown_signal};

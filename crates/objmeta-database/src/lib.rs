//! # objmeta-database
//!
//! PostgreSQL and MySQL connection management, deadline-bound sessions,
//! transaction helpers, schema migrations, and the metadata repository.

pub mod connection;
pub mod error;
pub mod migration;
pub mod repositories;
pub mod session;
pub mod tls;
pub mod transaction;

pub use connection::{BackendPool, DatabaseDriver, DatabasePool};
pub use repositories::MetadataRepository;
pub use session::Session;

//! Shared setup for tests that run against a live database.
//!
//! Set `OBJMETA_TEST_DRIVER` (`postgres` or `mysql`) and `OBJMETA_TEST_DSN`
//! to run them; otherwise each test returns early.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use objmeta_core::config::DatabaseConfig;
use objmeta_database::migration::run_migrations;
use objmeta_database::{DatabasePool, MetadataRepository};
use tokio::sync::Mutex;

/// Serializes tests that depend on an emptied folder surviving until they
/// sweep, since the sweep is global across storages.
pub static SWEEP_LOCK: Mutex<()> = Mutex::const_new(());

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A migrated pool and a repository on top of it.
pub struct TestStore {
    pub db: DatabasePool,
    pub repo: MetadataRepository,
}

/// Connect and migrate, or `None` when no test database is configured.
pub async fn store_or_skip() -> Option<TestStore> {
    let (Ok(driver), Ok(dsn)) = (
        std::env::var("OBJMETA_TEST_DRIVER"),
        std::env::var("OBJMETA_TEST_DSN"),
    ) else {
        eprintln!("Skipping database test (OBJMETA_TEST_DRIVER / OBJMETA_TEST_DSN unset)");
        return None;
    };

    let db = DatabasePool::connect(&DatabaseConfig::new(driver, dsn))
        .await
        .unwrap_or_else(|e| panic!("Test database setup failed: {e}"));
    run_migrations(&db)
        .await
        .unwrap_or_else(|e| panic!("Test migrations failed: {e}"));

    let repo = MetadataRepository::new(&db);
    Some(TestStore { db, repo })
}

/// A storage id no other test (or earlier run) has used.
pub fn unique_storage_id(label: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("test://{label}/{}-{nanos}-{n}", std::process::id())
}

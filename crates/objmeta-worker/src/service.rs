//! Service lifecycle: connect, migrate, start the reclaimer, shut down.

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use objmeta_core::config::AppConfig;
use objmeta_core::result::AppResult;
use objmeta_core::traits::MetadataStore;
use objmeta_database::migration::run_migrations;
use objmeta_database::{DatabasePool, MetadataRepository};

use crate::reclaimer::{OrphanReclaimer, ReclaimerHandle};

/// A running metadata store: the pool, the repository over it, and the
/// reclaimer task when enabled.
#[derive(Debug)]
pub struct Service {
    db: DatabasePool,
    repository: Arc<MetadataRepository>,
    reclaimer: Option<ReclaimerHandle>,
}

impl Service {
    /// Connect, apply pending migrations, and start the reclaimer.
    pub async fn start(config: &AppConfig) -> AppResult<Self> {
        let db = DatabasePool::connect(&config.database).await?;
        run_migrations(&db).await?;

        let repository = Arc::new(MetadataRepository::new(&db));

        let reclaimer = if config.reclaimer.enabled {
            let reclaimer =
                OrphanReclaimer::new(repository.clone(), config.reclaimer.interval());
            Some(reclaimer.spawn())
        } else {
            info!("Orphan folder reclaimer disabled by configuration");
            None
        };

        Ok(Self {
            db,
            repository,
            reclaimer,
        })
    }

    /// The store a transport adapter serves requests from.
    pub fn store(&self) -> Arc<dyn MetadataStore> {
        self.repository.clone()
    }

    /// The underlying pool.
    pub fn database(&self) -> &DatabasePool {
        &self.db
    }

    /// Stop the reclaimer, then close the pool.
    pub async fn shutdown(self) {
        if let Some(reclaimer) = self.reclaimer {
            reclaimer.shutdown().await;
        }
        self.db.close().await;
    }
}

/// Run the service until `shutdown` resolves.
pub async fn serve<S>(config: &AppConfig, shutdown: S) -> AppResult<()>
where
    S: Future<Output = ()>,
{
    let service = Service::start(config).await?;
    info!(
        driver = %service.database().driver(),
        "ObjMeta metadata store ready"
    );

    shutdown.await;

    info!("Shutting down ObjMeta...");
    service.shutdown().await;
    info!("ObjMeta shut down complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

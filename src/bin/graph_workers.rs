//! # Graph Workers Server
//!
//! Runs the evaluator and API worker pools next to an authoritative entity
//! graph and keeps their replicas in sync until Ctrl+C or SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration and in-memory storage
//! cargo run --bin graph-workers
//!
//! # Use PostgreSQL storage and the production config overlay
//! DATABASE_URL=postgresql://localhost/graph_workers GRAPH_WORKERS_ENV=production \
//!     cargo run --bin graph-workers
//! ```

use anyhow::Context;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use entity_graph_workers::config::ConfigManager;
use entity_graph_workers::logging;
use entity_graph_workers::notifier::BroadcastNotifier;
use entity_graph_workers::storage::Storage;
use entity_graph_workers::worker::ReplicaApplier;
use entity_graph_workers::WorkerManager;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_manager = ConfigManager::load().context("failed to load configuration")?;
    let config = config_manager.config().clone();
    logging::init_structured_logging(config_manager.environment(), config.logging.json);

    info!("🚀 Starting Graph Workers Server...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!("   Environment: {}", config_manager.environment());
    info!(
        "   Pools: {} evaluator workers, {} API workers",
        config.workers.evaluator_workers, config.workers.api_workers
    );

    let storage = open_storage().await?;
    let notifier = Arc::new(BroadcastNotifier::from_config(&config.notifier));

    let mut manager = WorkerManager::new(config.clone(), storage.clone(), notifier);
    manager.add_evaluator_workers(config.workers.evaluator_workers)?;
    manager.add_api_workers(config.workers.api_workers)?;
    manager.wait_for_worker_start().await?;

    // The authoritative graph starts from the same snapshot plus replay as the replicas
    let has_snapshot = storage.snapshots.latest_snapshot().await?.is_some();
    let (authoritative, feed) = ReplicaApplier::new(storage.clone())
        .load_authoritative_graph("authoritative")
        .await?;

    manager.submit_read_db_graph().await?;
    if has_snapshot {
        info!("🔧 Snapshot found, enabling evaluation without a full pass");
        manager.submit_enable_evaluations().await?;
    } else {
        info!("🔧 No snapshot found, running a full evaluation pass");
        manager.submit_start_evaluations().await?;
    }

    info!("🎉 Graph Workers Server started with {} vertices", authoritative.num_vertices());
    info!("   Press Ctrl+C to shutdown gracefully");

    tokio::select! {
        forwarded = manager.follow_graph_changes(feed) => {
            warn!(forwarded, "Authoritative graph change feed ended");
        }
        _ = shutdown_signal() => {
            info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        }
    }
    drop(authoritative);

    let grace = config.shutdown.graceful_timeout();
    if let Err(e) = manager.shutdown(grace).await {
        error!("Workers did not stop within {:?}: {}", grace, e);
        std::process::exit(1);
    }

    info!("👋 Graph Workers Server shutdown complete");
    Ok(())
}

#[cfg(feature = "postgres")]
async fn open_storage() -> anyhow::Result<Storage> {
    use entity_graph_workers::storage::postgres::PostgresStorage;

    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let postgres = PostgresStorage::connect(&url)
                .await
                .context("failed to connect to DATABASE_URL")?;
            postgres.migrate().await?;
            info!("   Storage: PostgreSQL");
            Ok(postgres.into_storage())
        }
        Err(_) => {
            info!("   Storage: in-memory");
            Ok(Storage::in_memory())
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn open_storage() -> anyhow::Result<Storage> {
    info!("   Storage: in-memory");
    Ok(Storage::in_memory())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received SIGTERM");
        },
    }
}

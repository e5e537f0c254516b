//! Hopper Worker
//!
//! Runs one consumer against a queue directory: the polling loop plus the
//! stale job reaper, until Ctrl-C.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hopper_store::JobStore;
use hopper_worker::config::Config;
use hopper_worker::scheduler::{JobPoller, StaleReaper};
use hopper_worker::service::{HandlerContext, JobHandler, LoggingHandler, PageCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopper_worker=info,hopper_store=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hopper Worker");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: worker_id={}, queue_dir={}",
        config.worker_id,
        config.queue_dir.display()
    );

    // Open the queue, repairing anything a crash left behind
    let queue_dir = config.queue_dir.clone();
    let store_config = config.store_config();
    let store = tokio::task::spawn_blocking(move || JobStore::open(queue_dir, store_config))
        .await
        .context("Store task panicked")?
        .context("Failed to open queue")?;

    info!("Initial queue stats: {}", store.stats());

    let handler: Arc<dyn JobHandler> = Arc::new(LoggingHandler::new());
    let context = HandlerContext::new(
        config.worker_id.clone(),
        PageCache::new(config.cache_ttl, config.cache_capacity),
    );

    let poller = JobPoller::new(config.clone(), store.clone(), handler, context);
    let reaper = StaleReaper::new(store, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested, finishing current job"),
            Err(e) => {
                warn!("Failed to listen for Ctrl-C, running until killed: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    let reaper_shutdown = shutdown_rx.clone();
    let reaper_handle = tokio::spawn(async move { reaper.run_until(reaper_shutdown).await });

    info!("Worker initialized successfully");
    info!(
        "Poll interval: {:?}, cooldown: {:?}, max retries: {}",
        config.poll_interval, config.cooldown, config.max_retries
    );

    if let Err(e) = poller.run_until(shutdown_rx).await {
        error!("Poller error: {:#}", e);
        return Err(e);
    }

    reaper_handle.await.context("Reaper task panicked")??;

    info!("Worker stopped");
    Ok(())
}

/// Loads configuration from environment variables
///
/// Unset variables take their defaults; a malformed one stops the worker.
fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Invalid worker configuration")?;
    config.validate().context("Invalid worker configuration")?;
    Ok(config)
}

//! be-productive DNS server - Entry point.
//!
//! Loads the persisted classification and access-policy documents, then
//! answers DNS queries on a UDP socket until interrupted.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use be_productive::clock::SystemClock;
use be_productive::config::Config;
use be_productive::dns::{UpstreamResolver, domain};
use be_productive::server::{HandlerOptions, QueryHandler, run_server};
use be_productive::store::{FileStorage, Stores};

fn load_config() -> Result<Config> {
    let config_path = std::env::var("CONFIG_PATH")
        .map(Cow::Owned)
        .unwrap_or(Cow::Borrowed("config.toml"));
    let path = Path::new(config_path.as_ref());

    if !path.exists() {
        info!(path = %path.display(), "No configuration file, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).context("Failed to load configuration")
}

async fn run() -> Result<()> {
    let config = load_config()?;

    // Must happen before any metric is recorded.
    be_productive::metrics::init(&config.metrics).context("Failed to initialize metrics")?;
    if config.metrics.enabled {
        info!("Metrics enabled on {}", config.metrics.listen);
    }

    info!("Starting be-productive DNS server...");
    info!("Data directory: {}", config.data_dir().display());

    let stores = Stores::load(
        FileStorage::new(config.classification_path()),
        FileStorage::new(config.policy_path()),
    )
    .await;

    let seeded: Vec<String> = config
        .distracting
        .iter()
        .filter_map(|d| domain::normalize(d))
        .collect();
    let added = stores.classifications.record_all(&seeded).await;
    info!(
        known = stores.classifications.len(),
        seeded = added,
        "Classification store loaded"
    );

    let socket = UdpSocket::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind DNS socket on {}", config.listen))?;

    let resolver = UpstreamResolver::new(config.upstream_resolver);
    info!("Upstream resolver: {}", resolver.upstream_addr());

    let handler = QueryHandler::new(
        resolver,
        &stores,
        SystemClock,
        HandlerOptions::from_config(&config),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server = tokio::spawn(run_server(socket, handler, shutdown_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down...");
            let _ = shutdown_tx.send(true);
            match (&mut server).await {
                Ok(Err(err)) => error!("Server error: {err:?}"),
                Err(err) => error!("Server task failed: {err}"),
                Ok(Ok(())) => {}
            }
        }
        result = &mut server => {
            match result {
                Ok(Err(err)) => error!("Server error: {err:?}"),
                Err(err) => error!("Server task failed: {err}"),
                Ok(Ok(())) => {}
            }
        }
    }

    if let Err(err) = stores.classifications.flush().await {
        warn!("Failed to write classifications on shutdown: {err}");
    }
    if let Err(err) = stores.policy.flush().await {
        warn!("Failed to write access policy on shutdown: {err}");
    }

    info!("Shutdown complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    run().await
}

//! Granule adder daemon.
//!
//! Subscribes to file-arrival notifications and registers new granules in
//! the mosaic catalog, skipping files the identity check already knows.

mod subscriber;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog_client::CatalogClient;
use mosaic_sync::{run_adder, SyncConfig};
use subscriber::RedisSubscriber;

#[derive(Parser, Debug)]
#[command(name = "adder")]
#[command(about = "Message-driven granule adder for a mosaic catalog")]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        env = "ADDER_CONFIG",
        default_value = "/etc/mosaic-sync/adder.yaml"
    )]
    config: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Granule adder started");

    let config = SyncConfig::load(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;
    let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = shutdown_tx.send(());
        }
    });

    run_adder(&catalog, &config, &RedisSubscriber, &mut shutdown_rx).await?;

    Ok(())
}

//! Maintenance CLI for mosaic catalog layers.
//!
//! Layer creation, one-off granule add/delete, and the expiry sweep; the
//! continuously running counterpart is the adder daemon.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog_client::CatalogClient;
use mosaic_sync::{expiry, granules, layers, LayersConfig, SyncConfig};

#[derive(Parser, Debug)]
#[command(name = "admin")]
#[command(about = "Maintenance commands for mosaic catalog layers")]
struct Args {
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create all configured image mosaic layers
    CreateLayers {
        /// Configuration file path
        config: PathBuf,
    },
    /// Create all configured layers for imagery in object storage
    CreateS3Layers {
        /// Configuration file path
        config: PathBuf,
    },
    /// Create the exposed directory of each configured layer
    CreateLayerDirs {
        /// Configuration file path
        config: PathBuf,
    },
    /// Add a file to its image mosaic layer
    AddGranule {
        /// Configuration file path
        config: PathBuf,
        /// File to register
        file: String,
    },
    /// Add a file in object storage to its image mosaic layer
    AddS3Granule {
        /// Configuration file path
        config: PathBuf,
        /// Image URL to register
        file: String,
    },
    /// Delete a file from its image mosaic layer
    DeleteGranule {
        /// Configuration file path
        config: PathBuf,
        /// File to remove
        file: String,
    },
    /// Delete granules older than the configured age
    Expire {
        /// Configuration file path
        config: PathBuf,
    },
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
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::CreateLayers { config } => {
            let config = load_layers_config(&config)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            layers::create_layers(&catalog, &config).await?;
            info!("Layer creation finished");
        }
        Command::CreateS3Layers { config } => {
            let config = load_layers_config(&config)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            layers::create_s3_layers(&catalog, &config).await?;
            info!("Layer creation finished");
        }
        Command::CreateLayerDirs { config } => {
            let config = load_layers_config(&config)?;
            for path in layers::exposed_layer_directories(&config)?.values() {
                println!("{}", path.display());
                fs::create_dir_all(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
            }
        }
        Command::AddGranule { config, file } => {
            let config = load_sync_config(&config)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            granules::add_file_to_mosaic(&catalog, &config, &file, "posix").await?;
        }
        Command::AddS3Granule { config, file } => {
            let config = load_sync_config(&config)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            granules::add_file_to_mosaic(&catalog, &config, &file, "s3").await?;
        }
        Command::DeleteGranule { config, file } => {
            let config = load_sync_config(&config)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            granules::delete_file_from_mosaic(&catalog, &config, &file).await?;
        }
        Command::Expire { config } => {
            let config_path = config;
            let config = load_sync_config(&config_path)?;
            let catalog = CatalogClient::new(&config.host, &config.user, &config.passwd)?;
            let started = Instant::now();
            expiry::delete_old_files(&catalog, &config).await?;
            info!(
                config = %config_path.display(),
                elapsed_secs = started.elapsed().as_secs_f64(),
                "Cleaning completed"
            );
        }
    }

    Ok(())
}

fn load_sync_config(path: &PathBuf) -> Result<SyncConfig> {
    SyncConfig::load(path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn load_layers_config(path: &PathBuf) -> Result<LayersConfig> {
    LayersConfig::load(path).with_context(|| format!("Failed to load config from {:?}", path))
}

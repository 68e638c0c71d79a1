//! Message-driven granule ingestion.
//!
//! The adder subscribes to file-arrival notifications and turns them into
//! catalog mutations. One loop invocation owns one subscription session;
//! the outer driver re-enters the loop until it reports a clean stop, so a
//! quiet bus (restart timeout) or an abnormal exit both lead to a fresh
//! subscription.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use catalog_client::{MosaicCatalog, RemoteGranule};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::granules;
use crate::identity;
use crate::paths;
use crate::wkt;

/// Poll interval for the blocking receive; bounds how promptly the
/// restart timeout is evaluated.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settings for opening a subscription session.
#[derive(Debug, Clone, Default)]
pub struct SubscriberOptions {
    pub services: String,
    pub topics: Vec<String>,
    pub nameserver: String,
    pub addresses: Option<Vec<String>>,
    pub use_address_listener: bool,
}

impl SubscriberOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            services: config.services.clone(),
            topics: config.topics.clone(),
            nameserver: config.nameserver.clone(),
            addresses: config.addresses.clone(),
            use_address_listener: config.use_address_listener,
        }
    }
}

/// A file-arrival notification from the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub productname: String,
    pub uri: String,
}

/// Capability to open subscription sessions.
#[async_trait]
pub trait Subscribe: Send + Sync {
    async fn open(&self, options: &SubscriberOptions) -> SyncResult<Box<dyn Subscription>>;
}

/// One open subscription session.
///
/// The session resource is released by drop on every exit path of the
/// loop, including errors and shutdown.
#[async_trait]
pub trait Subscription: Send {
    /// Wait up to `timeout` for the next notification; `Ok(None)` on a
    /// poll timeout.
    async fn recv(&mut self, timeout: Duration) -> SyncResult<Option<Notification>>;
}

/// Run the granule adder until it stops cleanly.
///
/// The inner loop reports `true` for a clean stop (shutdown signal) and
/// `false` when the restart timeout elapsed; anything else is logged and
/// the loop is re-entered with a fresh subscription.
pub async fn run_adder(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    subscriber: &dyn Subscribe,
    shutdown: &mut broadcast::Receiver<()>,
) -> SyncResult<()> {
    if config.topics.is_empty() {
        return Err(SyncError::MissingConfig("topics"));
    }

    loop {
        debug!("Starting granule adder loop");
        match adder_loop(catalog, config, subscriber, shutdown).await {
            Ok(true) => {
                info!("Granule adder stopped");
                return Ok(());
            }
            Ok(false) => debug!("Restarting granule adder loop"),
            Err(err) => {
                error!(error = %err, "Granule adder loop exited abnormally, restarting");
            }
        }
    }
}

/// One subscription session; returns `true` on a clean stop and `false`
/// when no messages arrived within the restart timeout.
async fn adder_loop(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    subscriber: &dyn Subscribe,
    shutdown: &mut broadcast::Receiver<()>,
) -> SyncResult<bool> {
    let options = SubscriberOptions::from_config(config);
    let mut subscription = subscriber.open(&options).await?;

    let mut latest_message_time = Utc::now();

    loop {
        let message = tokio::select! {
            _ = shutdown.recv() => return Ok(true),
            received = subscription.recv(POLL_INTERVAL) => received?,
        };

        if let Some(restart_timeout) = config.restart_timeout {
            let minutes_since_last =
                (Utc::now() - latest_message_time).num_milliseconds() as f64 / 60_000.0;
            if minutes_since_last > restart_timeout {
                debug!(
                    minutes = minutes_since_last,
                    "Restart timeout exceeded since last message"
                );
                return Ok(false);
            }
        }

        let Some(message) = message else {
            continue;
        };
        debug!(message = ?message, "New message received");
        latest_message_time = Utc::now();

        match process_message(catalog, config, &message).await {
            Ok(()) => {}
            Err(SyncError::PatternMismatch(_)) => {
                warn!("Filename pattern doesn't match");
            }
            Err(err) => return Err(err),
        }
    }
}

/// Turn one notification into a catalog mutation.
///
/// A product without a configured layer is dropped with an error log; a
/// file already present (by the identity check) is dropped silently; an
/// unsupported filesystem mode is an error for this message.
pub async fn process_message(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    message: &Notification,
) -> SyncResult<()> {
    let Some(store) = config.layers.get(&message.productname) else {
        error!(product = %message.productname, "No layer name for product");
        return Ok(());
    };

    let file_path = paths::to_internal(config, &message.uri, config.keep_subpath)
        .to_string_lossy()
        .into_owned();

    if identity::file_in_granules(
        catalog,
        &config.workspace,
        store,
        &file_path,
        config.identity_check_seconds,
        config.file_pattern.as_ref(),
    )
    .await?
    {
        return Ok(());
    }

    match config.filesystem.as_str() {
        "posix" => {
            wkt::write_wkt(
                config.write_wkt.as_deref(),
                config.exposed_target_dir.as_deref(),
                Path::new(&file_path),
            )?;
            granules::add_granule(catalog, &config.workspace, store, &file_path).await;
        }
        "s3" => {
            let remote = RemoteGranule {
                host: config.host.clone(),
                workspace: config.workspace.clone(),
                layer_name: store.clone(),
                image_url: file_path,
            };
            granules::add_remote_granule(catalog, &remote).await;
        }
        other => return Err(SyncError::UnsupportedFilesystem(other.to_string())),
    }
    Ok(())
}

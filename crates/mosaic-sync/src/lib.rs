//! Synchronization of raster granules with a mosaic catalog.
//!
//! Ties together the filename pattern engine and the catalog client:
//! duplicate detection for incoming files, a message-driven adder loop,
//! layer creation from property bundles, and expiry of stale granules.

pub mod adder;
pub mod config;
pub mod error;
pub mod expiry;
pub mod granules;
pub mod identity;
pub mod layers;
pub mod paths;
pub mod wkt;

pub use adder::{
    process_message, run_adder, Notification, Subscribe, SubscriberOptions, Subscription,
};
pub use config::{LayerEntry, LayersConfig, PropertiesConfig, SyncConfig};
pub use error::{SyncError, SyncResult};

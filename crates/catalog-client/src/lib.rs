//! REST client for a GeoServer-style mosaic catalog.
//!
//! The catalog stores raster mosaics as workspace/coveragestore/coverage
//! hierarchies; individual image files are "granules" in a coverage's
//! index. This crate provides the typed wire models, a reqwest-backed
//! client, and the [`MosaicCatalog`] trait the synchronization core is
//! written against.

pub mod client;
pub mod error;
pub mod models;

pub use client::CatalogClient;
pub use error::{CatalogError, CatalogResult};
pub use models::{
    CoverageList, CoverageMetadata, CoverageRef, Granule, GranuleCollection, GranuleProperties,
    RemoteGranule, StoreRef, TimeDimension, LAYER_TIME_FORMAT,
};

use async_trait::async_trait;

/// Granule-level catalog operations.
///
/// Implemented by [`CatalogClient`] for the real service and by in-memory
/// fakes in tests; the matcher and the ingestion loop only ever see this
/// trait.
#[async_trait]
pub trait MosaicCatalog: Send + Sync {
    /// Look up a coverage store; `None` when the store does not exist.
    async fn get_store(&self, workspace: &str, store: &str) -> CatalogResult<Option<StoreRef>>;

    /// List the coverages of a mosaic store.
    async fn mosaic_coverages(&self, store: &StoreRef) -> CatalogResult<CoverageList>;

    /// List the granules in a coverage's index.
    async fn list_granules(
        &self,
        coverage: &str,
        store: &StoreRef,
    ) -> CatalogResult<GranuleCollection>;

    /// Register a file in a mosaic store.
    async fn add_granule(
        &self,
        workspace: &str,
        store: &str,
        file_path: &str,
    ) -> CatalogResult<()>;

    /// Remove a granule from a coverage's index by id.
    async fn delete_granule(
        &self,
        coverage: &str,
        store: &StoreRef,
        granule_id: &str,
    ) -> CatalogResult<()>;

    /// Register a remote (object storage) image in a mosaic store.
    async fn add_remote_granule(&self, remote: &RemoteGranule) -> CatalogResult<()>;
}

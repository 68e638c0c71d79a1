//! Granule-level catalog operations and filename-driven store resolution.

use catalog_client::{
    CoverageRef, GranuleCollection, MosaicCatalog, RemoteGranule, StoreRef,
};
use pattern_parser::FieldValue;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::identity;
use crate::paths;

/// Resolve the named coverage within a store's coverage list.
///
/// Returns `None` (after a warning) when the store has no coverage of that
/// name.
pub async fn get_layer_coverage(
    catalog: &dyn MosaicCatalog,
    store: &str,
    handle: &StoreRef,
) -> SyncResult<Option<CoverageRef>> {
    let listing = catalog.mosaic_coverages(handle).await?;
    let coverage = listing
        .coverages
        .into_iter()
        .find(|coverage| coverage.name == store);
    if coverage.is_none() {
        warn!(layer = %store, "Layer not found");
    }
    Ok(coverage)
}

/// All granules currently registered in a layer.
pub async fn get_layer_granules(
    catalog: &dyn MosaicCatalog,
    coverage: &CoverageRef,
    handle: &StoreRef,
) -> SyncResult<GranuleCollection> {
    Ok(catalog.list_granules(&coverage.name, handle).await?)
}

/// Register a file in a mosaic layer.
///
/// Best-effort: a failed request is logged and the file is abandoned.
pub async fn add_granule(
    catalog: &dyn MosaicCatalog,
    workspace: &str,
    store: &str,
    file_path: &str,
) {
    match catalog.add_granule(workspace, store, file_path).await {
        Ok(()) => info!(
            granule = %paths::basename(file_path),
            workspace = %workspace,
            store = %store,
            "Granule added"
        ),
        Err(err) => error!(granule = %file_path, error = %err, "Adding granule failed"),
    }
}

/// Register a remote (object storage) image in a mosaic layer.
///
/// Best-effort, like [`add_granule`].
pub async fn add_remote_granule(catalog: &dyn MosaicCatalog, remote: &RemoteGranule) {
    match catalog.add_remote_granule(remote).await {
        Ok(()) => info!(
            granule = %remote.image_url,
            workspace = %remote.workspace,
            store = %remote.layer_name,
            "Granule added"
        ),
        Err(err) => error!(
            granule = %remote.image_url,
            error = %err,
            "Adding granule failed"
        ),
    }
}

/// Delete the granule whose stored location matches the given filename.
///
/// No-op when the store, coverage, or a matching granule id is absent.
pub async fn delete_granule(
    catalog: &dyn MosaicCatalog,
    workspace: &str,
    store: &str,
    file_name: &str,
) -> SyncResult<()> {
    let file_name = paths::basename(file_name);

    let Some(handle) = catalog.get_store(workspace, store).await? else {
        warn!(workspace = %workspace, store = %store, "Store not found");
        return Ok(());
    };
    let Some(coverage) = get_layer_coverage(catalog, store, &handle).await? else {
        return Ok(());
    };
    let granules = get_layer_granules(catalog, &coverage, &handle).await?;

    let granule_id = granules
        .features
        .iter()
        .find(|granule| granule.properties.location.contains(&file_name))
        .map(|granule| granule.id.clone());

    if let Some(granule_id) = granule_id {
        catalog
            .delete_granule(&coverage.name, &handle, &granule_id)
            .await?;
        info!(granule = %file_name, "Granule removed");
    }
    Ok(())
}

/// Resolve the store name for a file by parsing its basename with the
/// configured pattern and looking the layer-id field up in the product
/// map.
pub fn store_name_from_filename(config: &SyncConfig, file_path: &str) -> SyncResult<String> {
    let pattern = config
        .file_pattern
        .as_ref()
        .ok_or(SyncError::MissingConfig("file_pattern"))?;
    let layer_id = config
        .layer_id
        .as_deref()
        .ok_or(SyncError::MissingConfig("layer_id"))?;

    let fields = pattern.parse(&paths::basename(file_path))?;
    let id = match fields.get(layer_id) {
        Some(FieldValue::Text(id)) => id.clone(),
        Some(FieldValue::Time(_)) => {
            return Err(SyncError::Config(format!(
                "layer_id field '{}' is a time field",
                layer_id
            )))
        }
        None => {
            return Err(SyncError::Config(format!(
                "pattern has no field '{}'",
                layer_id
            )))
        }
    };

    config
        .layers
        .get(&id)
        .cloned()
        .ok_or_else(|| SyncError::Config(format!("no layer configured for '{}'", id)))
}

/// Add a file to its mosaic layer, resolving the layer from the filename.
///
/// Skips registration when the identity check finds the file already
/// present.
pub async fn add_file_to_mosaic(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    file_path: &str,
    filesystem: &str,
) -> SyncResult<()> {
    let internal = paths::to_internal(config, file_path, config.keep_subpath)
        .to_string_lossy()
        .into_owned();
    let store = store_name_from_filename(config, &internal)?;

    if identity::file_in_granules(
        catalog,
        &config.workspace,
        &store,
        &internal,
        config.identity_check_seconds,
        config.file_pattern.as_ref(),
    )
    .await?
    {
        return Ok(());
    }

    match filesystem {
        "posix" => {
            crate::wkt::write_wkt(
                config.write_wkt.as_deref(),
                config.exposed_target_dir.as_deref(),
                std::path::Path::new(file_path),
            )?;
            add_granule(catalog, &config.workspace, &store, &internal).await;
        }
        "s3" => {
            let remote = RemoteGranule {
                host: config.host.clone(),
                workspace: config.workspace.clone(),
                layer_name: store,
                image_url: internal,
            };
            add_remote_granule(catalog, &remote).await;
        }
        other => return Err(SyncError::UnsupportedFilesystem(other.to_string())),
    }
    Ok(())
}

/// Delete a file from its mosaic layer, resolving the layer from the
/// filename.
pub async fn delete_file_from_mosaic(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    file_path: &str,
) -> SyncResult<()> {
    let store = store_name_from_filename(config, file_path)?;
    delete_granule(catalog, &config.workspace, &store, file_path).await
}

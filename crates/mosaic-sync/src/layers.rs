//! Layer creation from property bundles, for filesystem and remote
//! (object storage) mosaics.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use bytes::Bytes;
use catalog_client::{CatalogClient, CoverageMetadata, MosaicCatalog, RemoteGranule, TimeDimension};
use pattern_parser::compose_str;
use tracing::{debug, error, info, warn};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::config::{yaml_scalar_to_string, LayerEntry, LayersConfig, PropertiesConfig};
use crate::error::{SyncError, SyncResult};
use crate::granules;
use crate::wkt;

/// Create every configured mosaic layer.
///
/// Existing stores are left alone; a store that fails to create is logged
/// and skipped. After creation the coverage metadata is saved and the seed
/// images shipped inside the bundle are removed from the granule index
/// (the files themselves stay).
pub async fn create_layers(catalog: &CatalogClient, config: &LayersConfig) -> SyncResult<()> {
    let bundle = create_property_bundle(&config.properties, None)?;
    let time_dimension = config
        .time_dimension
        .clone()
        .ok_or(SyncError::MissingConfig("time_dimension"))?;

    ensure_workspace(catalog, &config.workspace).await?;
    let directories = exposed_layer_directories(config)?;

    for layer in &config.layers {
        let mut items = compose_items(config, layer);
        let layer_name = match layer_name(&items) {
            Ok(name) => name,
            Err(err) => {
                error!(error = %err, items = ?items, "No layer name defined");
                continue;
            }
        };
        items.insert("layer_name".to_string(), layer_name.clone());

        // Sidecars for files without embedded projection metadata, written
        // before the store indexes them.
        if let Some(directory) = directories.get(&layer_name) {
            wkt::write_wkt_for_files(config.write_wkt.as_deref(), directory)?;
        }

        if !ensure_layer(catalog, &config.workspace, &layer_name, bundle.clone()).await? {
            continue;
        }
        if !save_layer_metadata(catalog, config, layer, &layer_name, &time_dimension, &items)
            .await?
        {
            continue;
        }

        // The seed image is only there to let the store initialize; drop it
        // from the index without touching the file.
        for file in &config.properties.files {
            granules::delete_granule(
                catalog,
                &config.workspace,
                &layer_name,
                &file.to_string_lossy(),
            )
            .await?;
        }
    }
    Ok(())
}

/// Create every configured layer for imagery living in object storage.
pub async fn create_s3_layers(catalog: &CatalogClient, config: &LayersConfig) -> SyncResult<()> {
    for layer in &config.layers {
        let mut items = compose_items(config, layer);
        let layer_name = match layer_name(&items) {
            Ok(name) => name,
            Err(err) => {
                error!(error = %err, items = ?items, "No layer name defined");
                continue;
            }
        };
        items.insert("layer_name".to_string(), layer_name.clone());

        let bundle = create_property_bundle(&config.properties, Some(&items))?;
        if let Err(err) = catalog
            .put_property_bundle(&config.workspace, &layer_name, bundle)
            .await
        {
            warn!(layer = %layer_name, error = %err, "Property bundle upload failed");
        }

        let image_url = layer
            .image_url
            .clone()
            .ok_or(SyncError::MissingConfig("image_url"))?;
        let remote = RemoteGranule {
            host: config.host.clone(),
            workspace: config.workspace.clone(),
            layer_name: layer_name.clone(),
            image_url,
        };
        granules::add_remote_granule(catalog, &remote).await;

        configure_coverage(catalog, config, &layer_name, &items).await?;
    }
    Ok(())
}

/// Full directory path for each configured layer.
pub fn exposed_layer_directories(
    config: &LayersConfig,
) -> SyncResult<BTreeMap<String, PathBuf>> {
    let base = match &config.exposed_base_dir {
        Some(directory) => directory.clone(),
        None => {
            warn!("No 'exposed_base_dir' given in config, using current directory");
            PathBuf::from(".")
        }
    };

    let mut directories = BTreeMap::new();
    for layer in &config.layers {
        let items = compose_items(config, layer);
        let name = layer_name(&items)?;
        let path = if config.create_subdirectories {
            base.join(&name)
        } else {
            base.clone()
        };
        directories.insert(name, path);
    }
    Ok(directories)
}

/// Write the property files (and any seed images) into a zip bundle.
///
/// With `metadata` given, property values are composed against it, leaving
/// unknown fields in place.
pub fn create_property_bundle(
    properties: &PropertiesConfig,
    metadata: Option<&BTreeMap<String, String>>,
) -> SyncResult<Bytes> {
    debug!("Creating property files");
    let mut package = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, entries) in &properties.properties {
        let mut contents = String::new();
        for (key, value) in entries {
            let mut line = format!("{}={}\n", key, yaml_scalar_to_string(value));
            if let Some(metadata) = metadata {
                line = compose_str(&line, metadata, true)?;
            }
            contents.push_str(&line);
        }
        package.start_file(name.as_str(), options)?;
        package.write_all(contents.as_bytes())?;
        debug!(file = %name, "Wrote property file");
    }

    for file in &properties.files {
        let data = fs::read(file)?;
        let archive_name = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        package.start_file(archive_name.as_str(), options)?;
        package.write_all(&data)?;
        debug!(file = %archive_name, "Added file to bundle");
    }

    let buffer = package.finish()?;
    Ok(Bytes::from(buffer.into_inner()))
}

/// Merge common items and the layer entry into one string map for name
/// and template composition.
fn compose_items(config: &LayersConfig, layer: &LayerEntry) -> BTreeMap<String, String> {
    let mut items: BTreeMap<String, String> = config
        .common_items
        .iter()
        .map(|(key, value)| (key.clone(), yaml_scalar_to_string(value)))
        .collect();

    for (key, value) in &layer.extra {
        items.insert(key.clone(), yaml_scalar_to_string(value));
    }
    if let Some(name) = &layer.name {
        items.insert("name".to_string(), name.clone());
    }
    if let Some(title) = &layer.title {
        items.insert("title".to_string(), title.clone());
    }
    if let Some(title_pattern) = &layer.title_pattern {
        items.insert("title_pattern".to_string(), title_pattern.clone());
    }
    if let Some(abstract_text) = &layer.abstract_text {
        items.insert("abstract".to_string(), abstract_text.clone());
    }
    if let Some(image_url) = &layer.image_url {
        items.insert("image_url".to_string(), image_url.clone());
    }
    if let Some(cache_age_max) = layer.cache_age_max {
        items.insert("cache_age_max".to_string(), cache_age_max.to_string());
    }

    items.insert("host".to_string(), config.host.clone());
    items.insert("workspace".to_string(), config.workspace.clone());
    items
}

/// Compose the layer name from the `name` entry, falling back to the
/// shared `layer_pattern`.
fn layer_name(items: &BTreeMap<String, String>) -> SyncResult<String> {
    let template = items
        .get("name")
        .or_else(|| items.get("layer_pattern"))
        .ok_or(SyncError::MissingConfig("name"))?;
    Ok(compose_str(template, items, false)?)
}

async fn ensure_workspace(catalog: &CatalogClient, workspace: &str) -> SyncResult<()> {
    if catalog.get_workspace(workspace).await?.is_none() {
        catalog.create_workspace(workspace).await?;
        info!(workspace = %workspace, "Created workspace");
    }
    Ok(())
}

/// Create the mosaic store when missing; `false` means the layer should
/// be skipped.
async fn ensure_layer(
    catalog: &CatalogClient,
    workspace: &str,
    layer_name: &str,
    bundle: Bytes,
) -> SyncResult<bool> {
    if catalog.get_store(workspace, layer_name).await?.is_some() {
        return Ok(true);
    }
    match catalog
        .create_imagemosaic(workspace, layer_name, bundle)
        .await
    {
        Ok(()) => {
            info!(layer = %layer_name, workspace = %workspace, "Layer created");
            Ok(true)
        }
        Err(err) => {
            error!(
                layer = %layer_name,
                workspace = %workspace,
                error = %err,
                "Failed to create layer"
            );
            Ok(false)
        }
    }
}

async fn save_layer_metadata(
    catalog: &CatalogClient,
    config: &LayersConfig,
    layer: &LayerEntry,
    layer_name: &str,
    time_dimension: &TimeDimension,
    items: &BTreeMap<String, String>,
) -> SyncResult<bool> {
    let Some(handle) = catalog.get_store(&config.workspace, layer_name).await? else {
        error!(
            workspace = %config.workspace,
            store = %layer_name,
            "Could not get coverage for workspace and store"
        );
        return Ok(false);
    };

    let title = match items.get("title").or_else(|| items.get("title_pattern")) {
        Some(title) => Some(compose_str(&clean_attribute(title), items, false)?),
        None => None,
    };
    let abstract_text = match items.get("abstract") {
        Some(text) => Some(compose_str(&clean_attribute(text), items, false)?),
        None => None,
    };

    let metadata = CoverageMetadata {
        title,
        abstract_text,
        keywords: layer.keywords.clone(),
        time: Some(time_dimension.clone()),
        cache_age_max: layer
            .cache_age_max
            .or_else(|| items.get("cache_age_max").and_then(|age| age.parse().ok())),
    };
    catalog.save_coverage(&handle, layer_name, &metadata).await?;

    info!(
        layer = %layer_name,
        workspace = %config.workspace,
        "Metadata written for layer"
    );
    Ok(true)
}

async fn configure_coverage(
    catalog: &CatalogClient,
    config: &LayersConfig,
    layer_name: &str,
    items: &BTreeMap<String, String>,
) -> SyncResult<()> {
    let template = config
        .coverage_template
        .as_deref()
        .ok_or(SyncError::MissingConfig("coverage_template"))?;
    let template = clean_attribute(template);

    let mut items = items.clone();
    let title_pattern = items
        .get("title_pattern")
        .cloned()
        .ok_or(SyncError::MissingConfig("title_pattern"))?;
    let title = compose_str(&title_pattern, &items, false)?;
    items.insert("title".to_string(), title);

    let abstract_text = items
        .get("abstract")
        .cloned()
        .ok_or(SyncError::MissingConfig("abstract"))?;
    let abstract_text = compose_str(&clean_attribute(&abstract_text), &items, false)?;
    items.insert("abstract".to_string(), abstract_text);

    let coverage_xml = compose_str(&template, &items, false)?;
    if let Err(err) = catalog
        .post_coverage_config(&config.workspace, layer_name, coverage_xml)
        .await
    {
        warn!(layer = %layer_name, error = %err, "Coverage configuration failed");
    }
    Ok(())
}

/// An attribute value may be inline text or the path of a text file.
fn clean_attribute(value: &str) -> String {
    fs::read_to_string(value)
        .unwrap_or_else(|_| value.to_string())
        .trim()
        .to_string()
}

//! Expiry sweep: delete granules older than the configured age, and
//! optionally their files.

use std::fs;
use std::path::Path;

use catalog_client::{CoverageRef, Granule, MosaicCatalog, StoreRef, LAYER_TIME_FORMAT};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::granules;
use crate::paths;
use crate::wkt;

/// Delete stale granules from every configured layer.
///
/// A granule is stale when its catalog time is older than `max_age`
/// minutes. With `delete_files` set, the exposed file and its projection
/// sidecar are removed as well.
pub async fn delete_old_files(catalog: &dyn MosaicCatalog, config: &SyncConfig) -> SyncResult<()> {
    let max_age = config.max_age.ok_or(SyncError::MissingConfig("max_age"))?;
    let cutoff = Utc::now() - Duration::minutes(max_age);

    for store in config.layers.values() {
        let Some(handle) = catalog.get_store(&config.workspace, store).await? else {
            warn!(workspace = %config.workspace, store = %store, "Store not found");
            continue;
        };
        debug!(store = %store, "Getting coverage");
        let Some(coverage) = granules::get_layer_coverage(catalog, store, &handle).await? else {
            continue;
        };
        debug!(store = %store, "Getting granules");
        let listing = granules::get_layer_granules(catalog, &coverage, &handle).await?;

        for granule in &listing.features {
            let Some(time) = granule_time(granule) else {
                continue;
            };
            if time < cutoff {
                delete_granule_from_catalog(catalog, config, store, &handle, &coverage, granule)
                    .await?;
                delete_files_from_fs(config, &granule.properties.location)?;
            }
        }
    }
    Ok(())
}

fn granule_time(granule: &Granule) -> Option<DateTime<Utc>> {
    let Some(time) = granule.properties.time.as_deref() else {
        warn!(granule = %granule.id, "Granule has no time property");
        return None;
    };
    match DateTime::parse_from_str(time, LAYER_TIME_FORMAT) {
        Ok(timestamp) => Some(timestamp.with_timezone(&Utc)),
        Err(err) => {
            warn!(granule = %granule.id, time = %time, error = %err, "Unparseable granule time");
            None
        }
    }
}

async fn delete_granule_from_catalog(
    catalog: &dyn MosaicCatalog,
    config: &SyncConfig,
    store: &str,
    handle: &StoreRef,
    coverage: &CoverageRef,
    granule: &Granule,
) -> SyncResult<()> {
    let file_name = paths::basename(&granule.properties.location);
    debug!(
        granule = %file_name,
        workspace = %config.workspace,
        store = %store,
        "Removing granule"
    );
    catalog
        .delete_granule(&coverage.name, handle, &granule.id)
        .await?;
    info!(
        granule = %file_name,
        workspace = %config.workspace,
        store = %store,
        "Granule removed"
    );
    Ok(())
}

fn delete_files_from_fs(config: &SyncConfig, catalog_location: &str) -> SyncResult<()> {
    if !config.delete_files {
        return Ok(());
    }
    let fs_path = paths::to_external(config, catalog_location, config.keep_subpath);
    remove_file(&fs_path, false)?;
    remove_file(&wkt::sidecar_path(&fs_path), true)
}

fn remove_file(path: &Path, is_sidecar: bool) -> SyncResult<()> {
    if path.exists() {
        fs::remove_file(path)?;
        info!(file = %path.display(), "File deleted");
    } else if !is_sidecar {
        warn!(file = %path.display(), "File not available on filesystem");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_client::GranuleProperties;

    fn granule(id: &str, time: Option<&str>) -> Granule {
        Granule {
            id: id.to_string(),
            properties: GranuleProperties {
                location: format!("/mnt/data/{}.tif", id),
                time: time.map(str::to_string),
            },
        }
    }

    #[test]
    fn test_granule_time_parses_catalog_format() {
        let parsed = granule_time(&granule("a", Some("2020-08-18T12:00:00.000+0000"))).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2020-08-18T12:00:00+00:00");
    }

    #[test]
    fn test_granule_time_handles_offset_with_colon() {
        assert!(granule_time(&granule("a", Some("2020-08-18T12:00:00.000+00:00"))).is_some());
    }

    #[test]
    fn test_granule_time_missing_or_bad() {
        assert!(granule_time(&granule("a", None)).is_none());
        assert!(granule_time(&granule("a", Some("yesterday"))).is_none());
    }
}

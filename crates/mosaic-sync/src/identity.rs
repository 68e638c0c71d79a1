//! Duplicate detection for incoming granule files.

use std::collections::BTreeMap;

use catalog_client::{CatalogError, Granule, MosaicCatalog};
use chrono::NaiveDateTime;
use pattern_parser::{FieldValue, Pattern, PatternError};
use tracing::info;

use crate::error::SyncResult;
use crate::granules;
use crate::paths;

/// Field holding the acquisition timestamp.
const TIME_FIELD: &str = "start_time";

/// Check whether a file is already registered in a layer.
///
/// With no tolerance or no pattern configured the check is opted out and
/// no catalog query is made. Otherwise every registered granule is tested
/// with [`file_equals_granule`]; the first match wins.
pub async fn file_in_granules(
    catalog: &dyn MosaicCatalog,
    workspace: &str,
    store: &str,
    file_path: &str,
    identity_check_seconds: Option<i64>,
    file_pattern: Option<&Pattern>,
) -> SyncResult<bool> {
    let (Some(tolerance), Some(pattern)) = (identity_check_seconds, file_pattern) else {
        return Ok(false);
    };

    let handle = catalog
        .get_store(workspace, store)
        .await?
        .ok_or_else(|| {
            CatalogError::request(format!("coverage store '{}:{}' not found", workspace, store))
        })?;
    let coverage = granules::get_layer_coverage(catalog, store, &handle)
        .await?
        .ok_or_else(|| {
            CatalogError::request(format!(
                "no coverage '{}' in store '{}:{}'",
                store, workspace, store
            ))
        })?;
    let listing = granules::get_layer_granules(catalog, &coverage, &handle).await?;

    for granule in &listing.features {
        if file_equals_granule(file_path, granule, tolerance, pattern)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Test a candidate file against one registered granule.
///
/// Both basenames are parsed with the pattern; the time fields are
/// compared first, gated by the tolerance (inclusive), and only then are
/// the remaining fields required to match exactly. A file whose name does
/// not fit the pattern is a pattern mismatch, which propagates.
pub fn file_equals_granule(
    file_path: &str,
    granule: &Granule,
    tolerance_seconds: i64,
    pattern: &Pattern,
) -> SyncResult<bool> {
    let mut file_parts = pattern.parse(&paths::basename(file_path))?;
    let granule_path = granule.properties.location.as_str();
    let mut granule_parts = pattern.parse(&paths::basename(granule_path))?;

    let file_time = pop_time(&mut file_parts)?;
    let granule_time = pop_time(&mut granule_parts)?;
    let diff_ms = (file_time - granule_time).num_milliseconds().abs();
    if diff_ms > tolerance_seconds * 1000 {
        return Ok(false);
    }

    // Within tolerance; every other field still has to agree.
    if file_parts.len() != granule_parts.len() {
        return Ok(false);
    }
    for (key, value) in &file_parts {
        if granule_parts.get(key) != Some(value) {
            return Ok(false);
        }
    }

    info!(new = %file_path, old = %granule_path, "Matching granule already exists");
    Ok(true)
}

fn pop_time(fields: &mut BTreeMap<String, FieldValue>) -> SyncResult<NaiveDateTime> {
    match fields.remove(TIME_FIELD) {
        Some(FieldValue::Time(time)) => Ok(time),
        Some(FieldValue::Text(value)) => Err(PatternError::TimeParse {
            field: TIME_FIELD.to_string(),
            value,
        }
        .into()),
        None => Err(PatternError::MissingField(TIME_FIELD.to_string()).into()),
    }
}

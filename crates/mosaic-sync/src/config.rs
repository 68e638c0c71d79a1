//! Typed configuration, loaded from YAML and validated up front.
//!
//! Raw serde structs mirror the config files; `resolve` turns them into
//! runtime types with every default applied in one place (credentials from
//! the environment, filename pattern compiled, tolerances checked).

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use catalog_client::TimeDimension;
use pattern_parser::Pattern;
use serde::Deserialize;

use crate::error::{SyncError, SyncResult};

const USER_ENV: &str = "GEOSERVER_USER";
const PASSWD_ENV: &str = "GEOSERVER_PASSWORD";
const DEFAULT_USER: &str = "admin";
const DEFAULT_PASSWD: &str = "geoserver";

/// Runtime configuration for granule synchronization (the adder daemon,
/// granule add/delete, expiry).
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub host: String,
    pub user: String,
    pub passwd: String,
    pub workspace: String,
    /// Product name to store/layer name.
    pub layers: BTreeMap<String, String>,
    pub topics: Vec<String>,
    pub services: String,
    pub nameserver: String,
    pub addresses: Option<Vec<String>>,
    pub use_address_listener: bool,
    /// Where granule files live on the catalog host.
    pub geoserver_target_dir: PathBuf,
    /// Where the same files are visible to this process.
    pub exposed_base_dir: PathBuf,
    /// Fallback directory for projection sidecars of files that are not
    /// visible locally.
    pub exposed_target_dir: Option<PathBuf>,
    pub keep_subpath: bool,
    /// Duplicate-detection time tolerance; `None` opts out of the check.
    pub identity_check_seconds: Option<i64>,
    pub file_pattern: Option<Pattern>,
    /// Pattern field used to resolve the store from a filename.
    pub layer_id: Option<String>,
    /// Minutes without messages before the adder loop restarts itself.
    pub restart_timeout: Option<f64>,
    pub filesystem: String,
    pub write_wkt: Option<String>,
    /// Granule age limit in minutes for the expiry sweep.
    pub max_age: Option<i64>,
    pub delete_files: bool,
}

#[derive(Debug, Deserialize)]
struct SyncConfigFile {
    host: String,
    user: Option<String>,
    passwd: Option<String>,
    workspace: String,
    #[serde(default)]
    layers: BTreeMap<String, String>,
    #[serde(default)]
    topics: Vec<String>,
    services: Option<String>,
    nameserver: Option<String>,
    addresses: Option<Vec<String>>,
    use_address_listener: Option<bool>,
    geoserver_target_dir: PathBuf,
    exposed_base_dir: PathBuf,
    exposed_target_dir: Option<PathBuf>,
    keep_subpath: Option<bool>,
    identity_check_seconds: Option<i64>,
    file_pattern: Option<String>,
    layer_id: Option<String>,
    restart_timeout: Option<f64>,
    filesystem: Option<String>,
    write_wkt: Option<String>,
    max_age: Option<i64>,
    delete_files: Option<bool>,
}

impl SyncConfig {
    /// Load and validate a sync configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate sync configuration from YAML text.
    pub fn from_yaml(content: &str) -> SyncResult<Self> {
        let file: SyncConfigFile = serde_yaml::from_str(content)?;
        resolve_sync_config(file)
    }
}

fn resolve_sync_config(file: SyncConfigFile) -> SyncResult<SyncConfig> {
    let (user, passwd) = resolve_credentials(file.user, file.passwd);

    let file_pattern = file
        .file_pattern
        .map(|pattern| {
            Pattern::new(&pattern)
                .map_err(|err| SyncError::Config(format!("file_pattern: {}", err)))
        })
        .transpose()?;

    if let Some(tolerance) = file.identity_check_seconds {
        if tolerance < 0 {
            return Err(SyncError::Config(format!(
                "identity_check_seconds must be non-negative, got {}",
                tolerance
            )));
        }
    }

    Ok(SyncConfig {
        host: file.host,
        user,
        passwd,
        workspace: file.workspace,
        layers: file.layers,
        topics: file.topics,
        services: file.services.unwrap_or_default(),
        nameserver: file.nameserver.unwrap_or_else(|| "localhost".to_string()),
        addresses: file.addresses,
        use_address_listener: file.use_address_listener.unwrap_or(true),
        geoserver_target_dir: file.geoserver_target_dir,
        exposed_base_dir: file.exposed_base_dir,
        exposed_target_dir: file.exposed_target_dir,
        keep_subpath: file.keep_subpath.unwrap_or(false),
        identity_check_seconds: file.identity_check_seconds,
        file_pattern,
        layer_id: file.layer_id,
        restart_timeout: file.restart_timeout,
        filesystem: file.filesystem.unwrap_or_else(|| "posix".to_string()),
        write_wkt: file.write_wkt,
        max_age: file.max_age,
        delete_files: file.delete_files.unwrap_or(false),
    })
}

fn resolve_credentials(user: Option<String>, passwd: Option<String>) -> (String, String) {
    let user = user
        .or_else(|| env::var(USER_ENV).ok())
        .unwrap_or_else(|| DEFAULT_USER.to_string());
    let passwd = passwd
        .or_else(|| env::var(PASSWD_ENV).ok())
        .unwrap_or_else(|| DEFAULT_PASSWD.to_string());
    (user, passwd)
}

/// A single layer definition for layer creation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayerEntry {
    pub name: Option<String>,
    pub title: Option<String>,
    pub title_pattern: Option<String>,
    /// Inline text or a path to a text file.
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub cache_age_max: Option<i64>,
    pub image_url: Option<String>,
    /// Free-form items available to name/title composition.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Property files packaged into the mosaic store bundle.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertiesConfig {
    /// Seed image files shipped alongside the property files.
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Property file name to its `key=value` entries.
    #[serde(flatten)]
    pub properties: BTreeMap<String, BTreeMap<String, serde_yaml::Value>>,
}

/// Runtime configuration for layer creation.
#[derive(Debug, Clone)]
pub struct LayersConfig {
    pub host: String,
    pub user: String,
    pub passwd: String,
    pub workspace: String,
    pub common_items: BTreeMap<String, serde_yaml::Value>,
    pub layers: Vec<LayerEntry>,
    pub properties: PropertiesConfig,
    pub time_dimension: Option<TimeDimension>,
    /// Inline XML or a path to a template file.
    pub coverage_template: Option<String>,
    pub exposed_base_dir: Option<PathBuf>,
    pub create_subdirectories: bool,
    pub write_wkt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LayersConfigFile {
    host: String,
    user: Option<String>,
    passwd: Option<String>,
    workspace: String,
    #[serde(default)]
    common_items: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    layers: Vec<LayerEntry>,
    #[serde(default)]
    properties: PropertiesConfig,
    time_dimension: Option<TimeDimension>,
    coverage_template: Option<String>,
    exposed_base_dir: Option<PathBuf>,
    create_subdirectories: Option<bool>,
    write_wkt: Option<String>,
}

impl LayersConfig {
    /// Load and validate a layer-creation configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate layer-creation configuration from YAML text.
    pub fn from_yaml(content: &str) -> SyncResult<Self> {
        let file: LayersConfigFile = serde_yaml::from_str(content)?;
        let (user, passwd) = resolve_credentials(file.user, file.passwd);

        Ok(LayersConfig {
            host: file.host,
            user,
            passwd,
            workspace: file.workspace,
            common_items: file.common_items,
            layers: file.layers,
            properties: file.properties,
            time_dimension: file.time_dimension,
            coverage_template: file.coverage_template,
            exposed_base_dir: file.exposed_base_dir,
            create_subdirectories: file.create_subdirectories.unwrap_or(true),
            write_wkt: file.write_wkt,
        })
    }
}

/// Render a YAML scalar the way it appears in a property file.
pub fn yaml_scalar_to_string(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(text) => text.clone(),
        serde_yaml::Value::Number(number) => number.to_string(),
        serde_yaml::Value::Bool(flag) => flag.to_string(),
        serde_yaml::Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_config_defaults() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
workspace: satellite
geoserver_target_dir: /mnt/data
exposed_base_dir: /data/exposed
layers:
  airmass: airmass_store
"#;
        let config = SyncConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.filesystem, "posix");
        assert_eq!(config.nameserver, "localhost");
        assert!(config.use_address_listener);
        assert!(!config.keep_subpath);
        assert!(!config.delete_files);
        assert!(config.identity_check_seconds.is_none());
        assert!(config.file_pattern.is_none());
        assert_eq!(config.layers["airmass"], "airmass_store");
    }

    #[test]
    fn test_sync_config_compiles_file_pattern() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
workspace: satellite
geoserver_target_dir: /mnt/data
exposed_base_dir: /data/exposed
file_pattern: "{start_time:%Y%m%d_%H%M}_{area}_{product}.tif"
identity_check_seconds: 60
"#;
        let config = SyncConfig::from_yaml(yaml).unwrap();
        let pattern = config.file_pattern.unwrap();
        assert!(pattern.parse("20200818_1200_europe_airmass.tif").is_ok());
    }

    #[test]
    fn test_sync_config_rejects_bad_pattern() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
workspace: satellite
geoserver_target_dir: /mnt/data
exposed_base_dir: /data/exposed
file_pattern: "{start_time"
"#;
        assert!(matches!(
            SyncConfig::from_yaml(yaml),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_sync_config_rejects_negative_tolerance() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
workspace: satellite
geoserver_target_dir: /mnt/data
exposed_base_dir: /data/exposed
identity_check_seconds: -5
"#;
        assert!(matches!(
            SyncConfig::from_yaml(yaml),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_sync_config_missing_required_key() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
workspace: satellite
exposed_base_dir: /data/exposed
"#;
        assert!(SyncConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_layers_config_round_trip() {
        let yaml = r#"
host: http://localhost:8080/geoserver/rest/
user: user
passwd: passwd
workspace: satellite
common_items:
  area_name: europe
  layer_pattern: "{area_name}_{product_name}"
  cache_age_max: 86400
layers:
  - product_name: airmass
    title: "Airmass RGB"
    keywords: [satellite, rgb]
properties:
  files: []
  indexer:
    TimeAttribute: time
time_dimension:
  name: time
  enabled: true
  presentation: LIST
  units: ISO8601
  nearest_match_enabled: true
"#;
        let config = LayersConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.workspace, "satellite");
        assert!(config.create_subdirectories);
        assert_eq!(config.layers.len(), 1);
        assert_eq!(config.layers[0].title.as_deref(), Some("Airmass RGB"));
        assert_eq!(
            config.layers[0].extra["product_name"],
            serde_yaml::Value::String("airmass".to_string())
        );
        assert_eq!(
            yaml_scalar_to_string(&config.common_items["cache_age_max"]),
            "86400"
        );
        let time = config.time_dimension.unwrap();
        assert_eq!(time.presentation, "LIST");
        assert_eq!(time.nearest_match_enabled, Some(true));
    }
}

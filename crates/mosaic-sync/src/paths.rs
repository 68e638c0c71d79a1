//! Conversion between exposed and catalog-internal file paths.

use std::path::{Path, PathBuf};

use crate::config::SyncConfig;

/// Basename of a path or URI as a plain string.
pub fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Map a file path between the exposed and the catalog-internal directory
/// trees.
///
/// The forward direction rewrites an externally visible path onto
/// `geoserver_target_dir`; `inverse` rewrites a catalog location back onto
/// `exposed_base_dir`. Only the basename is carried over unless
/// `keep_subpath` is set, in which case the sub-path beneath the source
/// root is preserved (falling back to the basename for paths outside the
/// root). Pure path manipulation; nothing is checked for existence.
pub fn convert_file_path(
    config: &SyncConfig,
    file_path: &str,
    inverse: bool,
    keep_subpath: bool,
) -> PathBuf {
    let (source_root, target_root) = if inverse {
        (&config.geoserver_target_dir, &config.exposed_base_dir)
    } else {
        (&config.exposed_base_dir, &config.geoserver_target_dir)
    };

    let path = Path::new(file_path);
    let relative = if keep_subpath {
        path.strip_prefix(source_root).ok().map(Path::to_path_buf)
    } else {
        None
    };
    let relative = relative.unwrap_or_else(|| PathBuf::from(basename(file_path)));

    target_root.join(relative)
}

/// Rewrite an externally visible path to the catalog host's tree.
pub fn to_internal(config: &SyncConfig, file_path: &str, keep_subpath: bool) -> PathBuf {
    convert_file_path(config, file_path, false, keep_subpath)
}

/// Rewrite a catalog location to the externally visible tree.
pub fn to_external(config: &SyncConfig, file_path: &str, keep_subpath: bool) -> PathBuf {
    convert_file_path(config, file_path, true, keep_subpath)
}

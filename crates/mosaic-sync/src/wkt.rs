//! Projection sidecar (`.prj`) writing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};

/// Write the configured WKT string next to an image file.
///
/// The sidecar gets the image's stem with a `.prj` ending. When the image
/// is not visible locally the sidecar lands in `exposed_target_dir`, which
/// must then be configured.
pub fn write_wkt(
    wkt: Option<&str>,
    exposed_target_dir: Option<&Path>,
    image_path: &Path,
) -> SyncResult<()> {
    let Some(wkt) = wkt else {
        return Ok(());
    };

    let wkt_path = if image_path.exists() {
        image_path.with_extension("prj")
    } else {
        let directory =
            exposed_target_dir.ok_or(SyncError::MissingConfig("exposed_target_dir"))?;
        let stem = image_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        directory.join(format!("{}.prj", stem))
    };

    fs::write(&wkt_path, wkt)?;
    debug!(path = %wkt_path.display(), "Wrote projection file");
    Ok(())
}

/// Write WKT sidecars for every file in a directory.
///
/// Existing `.prj` files and subdirectories are skipped; a file we lack
/// permission for is logged and skipped.
pub fn write_wkt_for_files(wkt: Option<&str>, directory: &Path) -> SyncResult<()> {
    if wkt.is_none() {
        return Ok(());
    }

    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(directory = %directory.display(), error = %err, "Skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_dir() || path.extension().is_some_and(|ext| ext == "prj") {
            continue;
        }
        match write_wkt(wkt, None, path) {
            Ok(()) => {}
            Err(SyncError::Io(err)) if err.kind() == ErrorKind::PermissionDenied => {
                warn!(file = %path.display(), "Could not write .prj file");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Sidecar path for a catalog location: same stem, `.prj` ending.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    image_path.with_extension("prj")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_wkt_next_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("image.tif");
        fs::write(&image, "image").unwrap();

        write_wkt(Some("mock WKT string"), None, &image).unwrap();

        let sidecar = dir.path().join("image.prj");
        assert_eq!(fs::read_to_string(sidecar).unwrap(), "mock WKT string");
    }

    #[test]
    fn test_write_wkt_missing_file_uses_target_dir() {
        let dir = tempfile::tempdir().unwrap();
        let image = Path::new("/mnt/data/image.tif");

        write_wkt(Some("mock WKT string"), Some(dir.path()), image).unwrap();

        assert!(dir.path().join("image.prj").exists());
    }

    #[test]
    fn test_write_wkt_missing_file_without_target_dir() {
        let err = write_wkt(Some("wkt"), None, Path::new("/mnt/data/image.tif")).unwrap_err();
        assert!(matches!(err, SyncError::MissingConfig("exposed_target_dir")));
    }

    #[test]
    fn test_write_wkt_disabled_is_a_no_op() {
        write_wkt(None, None, Path::new("/mnt/data/image.tif")).unwrap();
    }

    #[test]
    fn test_write_wkt_for_files_skips_sidecars_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("image.tif"), "image").unwrap();
        fs::create_dir(dir.path().join("image")).unwrap();

        write_wkt_for_files(Some("mock WKT string"), dir.path()).unwrap();
        assert!(dir.path().join("image.prj").exists());

        // A second pass only sees the image and its sidecar; the count of
        // entries named image.* stays at two.
        write_wkt_for_files(Some("mock WKT string"), dir.path()).unwrap();
        let count = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .count();
        assert_eq!(count, 2);
    }
}

//! Filesystem inventory: recursive discovery of `.torrent` files and
//! candidate download files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Recursively finds every `.torrent` file under `root`. If `root` is
/// itself a file, it is returned directly when its name ends in
/// `.torrent` — mirroring the original tool's `os.path.isfile` branch for a
/// single metainfo path passed on the command line.
pub fn discover_torrents(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Err(Error::Config(format!(
            "torrent path does not exist: {}",
            root.display()
        )));
    }
    if root.is_file() {
        return Ok(if has_extension(root, "torrent") {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| Error::Config(e.to_string()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), "torrent") {
            found.push(entry.path().to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

/// Recursively yields every regular file under `root` as a
/// `(physicalPath, size)` pair, for use as the Verifier's candidate
/// population.
pub fn discover_candidates(root: &Path) -> Result<Vec<(PathBuf, u64)>> {
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "downloads root is not a directory: {}",
            root.display()
        )));
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| Error::Config(e.to_string()))?;
        if entry.file_type().is_file() {
            let size = entry
                .metadata()
                .map_err(|e| Error::Config(e.to_string()))?
                .len();
            found.push((entry.path().to_path_buf(), size));
        }
    }
    found.sort();
    Ok(found)
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

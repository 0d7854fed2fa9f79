//! Process-wide registry of open store locations.
//!
//! A location can be held by at most one live store at a time. The lease is
//! returned when it is dropped.

use super::error::{CatalogError, CatalogResult};
use lazy_static::lazy_static;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

lazy_static! {
    static ref OPEN_LOCATIONS: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());
}

#[derive(Debug)]
pub(super) struct LocationLease {
    path: PathBuf,
}

impl LocationLease {
    /// Claims `path` for the calling store. The parent directory is created
    /// if missing so the path can be normalized.
    pub(super) fn acquire(path: &Path) -> CatalogResult<Self> {
        let path = normalize_location(path)?;
        let mut open = OPEN_LOCATIONS
            .lock()
            .map_err(|_| CatalogError::StorageUnavailable("location registry poisoned".into()))?;
        if !open.insert(path.clone()) {
            return Err(CatalogError::StorageUnavailable(format!(
                "{:?} is already open by another catalog handle",
                path
            )));
        }
        debug!("Acquired store location {:?}", path);
        Ok(Self { path })
    }

    pub(super) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LocationLease {
    fn drop(&mut self) {
        if let Ok(mut open) = OPEN_LOCATIONS.lock() {
            open.remove(&self.path);
            debug!("Released store location {:?}", self.path);
        }
    }
}

/// Absolute form of a store location with the parent directory created.
fn normalize_location(path: &Path) -> CatalogResult<PathBuf> {
    let parent = parent_dir(path)?;
    std::fs::create_dir_all(&parent).map_err(|e| unavailable(path, e))?;
    resolve_location(path)
}

/// Absolute form of a store location, without touching the filesystem.
///
/// An existing file resolves through every symlink, so two names for the
/// same database compare equal. Otherwise only the parent is resolved, if
/// it exists.
pub fn resolve_location(path: &Path) -> CatalogResult<PathBuf> {
    if path.is_file() {
        return path.canonicalize().map_err(|e| unavailable(path, e));
    }
    let file_name = path.file_name().ok_or_else(|| {
        CatalogError::StorageUnavailable(format!("{:?} does not name a file", path))
    })?;
    let parent = parent_dir(path)?;
    let parent = if parent.is_dir() {
        parent.canonicalize().map_err(|e| unavailable(path, e))?
    } else {
        parent
    };
    Ok(parent.join(file_name))
}

fn parent_dir(path: &Path) -> CatalogResult<PathBuf> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if parent.is_absolute() {
        return Ok(parent.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| unavailable(path, e))?;
    Ok(cwd.join(parent))
}

fn unavailable(path: &Path, e: std::io::Error) -> CatalogError {
    CatalogError::StorageUnavailable(format!("{:?}: {}", path, e))
}

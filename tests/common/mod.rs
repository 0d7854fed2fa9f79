//! Common test infrastructure
//!
//! Every test gets its own temporary directory and catalog file, so tests
//! never contend for the same store location.

use geotag_catalog::{Coordinates, MediaCatalog, NewMediaRecord, StoreOptions};
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestCatalog {
    pub catalog: MediaCatalog,
    pub db_path: PathBuf,
    _temp_dir: TempDir, // Keep temp dir alive
}

impl TestCatalog {
    pub async fn open() -> Self {
        Self::open_with(StoreOptions::default()).await
    }

    pub async fn open_with(options: StoreOptions) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("media_catalog.db");
        let catalog = MediaCatalog::open(&db_path, options).await.unwrap();
        Self {
            catalog,
            db_path,
            _temp_dir: temp_dir,
        }
    }
}

pub fn new_record(uri: &str, captured_at: &str, latitude: f64, longitude: f64) -> NewMediaRecord {
    NewMediaRecord::new(uri, captured_at, Coordinates::new(latitude, longitude))
}

//! Synchronous storage layer of the media catalog.
//!
//! `MediaStore` is the seam between the async `MediaCatalog` handle and the
//! engine. Every method is a short blocking call; the catalog runs them on
//! the blocking thread pool.

mod error;
mod location_lease;
mod models;
mod schema;
mod sqlite_media_store;
pub mod validation;

pub use error::{CatalogError, CatalogResult};
pub use location_lease::resolve_location;
pub use models::*;
pub use schema::{DEFAULT_DB_FILE_NAME, MEDIA_RECORDS_TABLE, MEDIA_VERSIONED_SCHEMAS};
pub use sqlite_media_store::SqliteMediaStore;
pub use validation::ValidationError;

use std::path::Path;

pub trait MediaStore: Send + Sync {
    /// Where the store lives on disk.
    fn location(&self) -> &Path;

    // Mutations, each one its own transaction
    fn create(&self, record: &NewMediaRecord) -> CatalogResult<MediaId>;
    fn update_uri(&self, id: MediaId, new_uri: &str) -> CatalogResult<()>;
    fn delete(&self, id: MediaId) -> CatalogResult<()>;

    // Reads
    fn get(&self, id: MediaId) -> CatalogResult<MediaRecord>;
    /// All records in ascending id order.
    fn list_all(&self) -> CatalogResult<Vec<MediaRecord>>;
    /// Marker projection of all records in ascending id order.
    fn map_markers(&self) -> CatalogResult<Vec<MapMarker>>;
    fn count(&self) -> CatalogResult<u64>;

    /// Releases the underlying handle. Later calls fail with `NotInitialized`.
    fn close(&self) -> CatalogResult<()>;
}

//! Geotagged media catalog
//!
//! On-device store of captured images with their capture time and position,
//! plus the search and map projections the gallery and map views read.

pub mod capture;
pub mod catalog;
pub mod config;
pub mod media_store;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use catalog::MediaCatalog;
pub use media_store::{
    CatalogError, CatalogResult, Coordinates, MapMarker, MediaId, MediaRecord, NewMediaRecord,
    StoreOptions, ValidationError,
};

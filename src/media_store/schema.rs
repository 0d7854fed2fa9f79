//! SQLite schema definitions for the media catalog database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

/// Well-known file name of the catalog inside its data directory.
pub const DEFAULT_DB_FILE_NAME: &str = "media_catalog.db";

pub const MEDIA_RECORDS_TABLE: &str = "media_records";

// =============================================================================
// Version 1 - Media records
// =============================================================================

/// One row per captured image. Coordinates and capture time are written once.
const MEDIA_RECORDS_TABLE_V1: Table = Table {
    name: MEDIA_RECORDS_TABLE,
    columns: &[
        sqlite_column!(
            "id",
            SqlType::Integer,
            is_primary_key = true,
            is_autoincrement = true
        ),
        sqlite_column!("uri", SqlType::Text, non_null = true),
        sqlite_column!("captured_at", SqlType::Text, non_null = true),
        sqlite_column!("latitude", SqlType::Real, non_null = true),
        sqlite_column!("longitude", SqlType::Real, non_null = true),
    ],
    indices: &[("idx_media_records_captured_at", "captured_at")],
};

pub const MEDIA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[MEDIA_RECORDS_TABLE_V1],
}];

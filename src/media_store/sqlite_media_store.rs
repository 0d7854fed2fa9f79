use super::error::{CatalogError, CatalogResult};
use super::location_lease::LocationLease;
use super::models::{MapMarker, MediaId, MediaRecord, NewMediaRecord, StoreOptions};
use super::schema::MEDIA_VERSIONED_SCHEMAS;
use super::validation::{validate_new_record, validate_uri};
use super::MediaStore;
use crate::sqlite_persistence::read_schema_version;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

struct OpenConnection {
    conn: Connection,
    lease: LocationLease,
}

/// `MediaStore` backed by a single SQLite connection.
///
/// The connection sits behind a mutex, so statements never interleave and a
/// reader can only ever see committed rows.
pub struct SqliteMediaStore {
    inner: Mutex<Option<OpenConnection>>,
    db_path: std::path::PathBuf,
}

impl SqliteMediaStore {
    pub fn open<P: AsRef<Path>>(db_path: P, options: &StoreOptions) -> CatalogResult<Self> {
        let lease = LocationLease::acquire(db_path.as_ref())?;
        let db_path = lease.path().to_path_buf();

        let conn = Self::open_connection(&db_path, options)
            .map_err(|e| CatalogError::StorageUnavailable(format!("{:#}", e)))?;

        Ok(Self {
            inner: Mutex::new(Some(OpenConnection { conn, lease })),
            db_path,
        })
    }

    fn open_connection(path: &Path, options: &StoreOptions) -> Result<Connection> {
        let mut conn = Connection::open(path)
            .with_context(|| format!("Failed to open media catalog at {:?}", path))?;
        conn.busy_timeout(Duration::from_millis(options.busy_timeout_ms))?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let latest = MEDIA_VERSIONED_SCHEMAS
            .last()
            .context("No media catalog schema declared")?;

        match read_schema_version(&conn)? {
            None => {
                let table_count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                    [],
                    |row| row.get(0),
                )?;
                if table_count > 0 {
                    bail!(
                        "{:?} holds {} tables but is not a media catalog",
                        path,
                        table_count
                    );
                }
                info!("Creating new media catalog at {:?}", path);
                latest.create(&mut conn)?;
            }
            Some(db_version) => {
                let schema = MEDIA_VERSIONED_SCHEMAS
                    .iter()
                    .find(|s| s.version == db_version)
                    .with_context(|| format!("Unknown media catalog version {}", db_version))?;
                schema.validate(&conn).with_context(|| {
                    format!(
                        "Media catalog schema validation failed for version {}",
                        db_version
                    )
                })?;
                info!(
                    "Opened existing media catalog at {:?} (version {})",
                    path, db_version
                );
            }
        }

        // Only switch journaling once the file is known to be ours
        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("Media catalog journal mode: {}", journal_mode);

        Ok(conn)
    }

    fn lock(&self) -> CatalogResult<MutexGuard<'_, Option<OpenConnection>>> {
        self.inner
            .lock()
            .map_err(|_| CatalogError::TransactionFailed("connection mutex poisoned".into()))
    }

    /// Runs `f` on the open connection, or fails with `NotInitialized` once closed.
    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let mut guard = self.lock()?;
        let open = guard.as_mut().ok_or(CatalogError::NotInitialized)?;
        f(&mut open.conn)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<MediaRecord> {
        Ok(MediaRecord {
            id: MediaId(row.get("id")?),
            uri: row.get("uri")?,
            captured_at: row.get("captured_at")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
        })
    }
}

impl MediaStore for SqliteMediaStore {
    fn location(&self) -> &Path {
        &self.db_path
    }

    fn create(&self, record: &NewMediaRecord) -> CatalogResult<MediaId> {
        validate_new_record(record)?;
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(CatalogError::write)?;
            tx.execute(
                "INSERT INTO media_records (uri, captured_at, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.uri,
                    record.captured_at,
                    record.latitude,
                    record.longitude
                ],
            )
            .map_err(CatalogError::write)?;
            let id = MediaId(tx.last_insert_rowid());
            tx.commit().map_err(CatalogError::write)?;
            debug!("Created media record {}", id);
            Ok(id)
        })
    }

    fn update_uri(&self, id: MediaId, new_uri: &str) -> CatalogResult<()> {
        validate_uri(new_uri)?;
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(CatalogError::write)?;
            let changed = tx
                .execute(
                    "UPDATE media_records SET uri = ?1 WHERE id = ?2",
                    params![new_uri, id.0],
                )
                .map_err(CatalogError::write)?;
            if changed == 0 {
                return Err(CatalogError::NotFound(id));
            }
            tx.commit().map_err(CatalogError::write)?;
            debug!("Re-pointed media record {} to {}", id, new_uri);
            Ok(())
        })
    }

    fn delete(&self, id: MediaId) -> CatalogResult<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction().map_err(CatalogError::write)?;
            let changed = tx
                .execute("DELETE FROM media_records WHERE id = ?1", params![id.0])
                .map_err(CatalogError::write)?;
            if changed == 0 {
                return Err(CatalogError::NotFound(id));
            }
            tx.commit().map_err(CatalogError::write)?;
            debug!("Deleted media record {}", id);
            Ok(())
        })
    }

    fn get(&self, id: MediaId) -> CatalogResult<MediaRecord> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, uri, captured_at, latitude, longitude
                 FROM media_records WHERE id = ?1",
                params![id.0],
                Self::row_to_record,
            )
            .optional()
            .map_err(CatalogError::read)?
            .ok_or(CatalogError::NotFound(id))
        })
    }

    fn list_all(&self) -> CatalogResult<Vec<MediaRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, uri, captured_at, latitude, longitude
                     FROM media_records
                     ORDER BY id ASC",
                )
                .map_err(CatalogError::read)?;
            let records = stmt
                .query_map([], Self::row_to_record)
                .map_err(CatalogError::read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(CatalogError::read)?;
            Ok(records)
        })
    }

    fn map_markers(&self) -> CatalogResult<Vec<MapMarker>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, latitude, longitude FROM media_records ORDER BY id ASC")
                .map_err(CatalogError::read)?;
            let markers = stmt
                .query_map([], |row| {
                    Ok(MapMarker {
                        id: MediaId(row.get(0)?),
                        latitude: row.get(1)?,
                        longitude: row.get(2)?,
                    })
                })
                .map_err(CatalogError::read)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(CatalogError::read)?;
            Ok(markers)
        })
    }

    fn count(&self) -> CatalogResult<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM media_records", [], |row| row.get(0))
                .map_err(CatalogError::read)?;
            Ok(count as u64)
        })
    }

    fn close(&self) -> CatalogResult<()> {
        let taken = self.lock()?.take();
        let Some(OpenConnection { conn, lease }) = taken else {
            return Ok(());
        };
        let result = conn.close().map_err(|(_, e)| {
            warn!("Error while closing media catalog at {:?}: {}", self.db_path, e);
            CatalogError::TransactionFailed(e.to_string())
        });
        // The location is free again even if the engine complained on close
        drop(lease);
        info!("Closed media catalog at {:?}", self.db_path);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media_store::models::Coordinates;
    use crate::media_store::ValidationError;
    use tempfile::TempDir;

    struct TestStore {
        store: SqliteMediaStore,
        _temp_dir: TempDir, // Keep temp dir alive
    }

    fn create_test_store() -> TestStore {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("media.db");
        let store = SqliteMediaStore::open(&db_path, &StoreOptions::default()).unwrap();
        TestStore {
            store,
            _temp_dir: temp_dir,
        }
    }

    fn new_record(uri: &str, captured_at: &str, lat: f64, lon: f64) -> NewMediaRecord {
        NewMediaRecord::new(uri, captured_at, Coordinates::new(lat, lon))
    }

    #[test]
    fn test_create_and_get() {
        let test = create_test_store();
        let store = &test.store;

        let input = new_record("a.jpg", "2024-01-01T00:00:00Z", 37.0, -122.0);
        let id = store.create(&input).unwrap();
        assert_eq!(id, MediaId(1));

        let record = store.get(id).unwrap();
        assert_eq!(record, input.into_record(id));
    }

    #[test]
    fn test_coordinates_survive_roundtrip_exactly() {
        let test = create_test_store();
        let store = &test.store;

        let input = new_record("p.jpg", "2024-01-01T00:00:00Z", 37.78825, -122.4324);
        let id = store.create(&input).unwrap();
        let record = store.get(id).unwrap();
        assert_eq!(record.latitude, 37.78825);
        assert_eq!(record.longitude, -122.4324);
    }

    #[test]
    fn test_invalid_record_leaves_store_unchanged() {
        let test = create_test_store();
        let store = &test.store;

        store
            .create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 1.0, 1.0))
            .unwrap();
        let err = store
            .create(&new_record("b.jpg", "2024-01-01T00:00:00Z", 91.0, 1.0))
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Validation(ValidationError::OutOfRange { .. })
        ));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let test = create_test_store();
        assert!(matches!(
            test.store.get(MediaId(7)),
            Err(CatalogError::NotFound(MediaId(7)))
        ));
    }

    #[test]
    fn test_update_uri_keeps_time_and_location() {
        let test = create_test_store();
        let store = &test.store;

        let id = store
            .create(&new_record("old.jpg", "2024-01-01T00:00:00Z", 10.0, 20.0))
            .unwrap();
        store.update_uri(id, "new.jpg").unwrap();

        let record = store.get(id).unwrap();
        assert_eq!(record.uri, "new.jpg");
        assert_eq!(record.captured_at, "2024-01-01T00:00:00Z");
        assert_eq!(record.coordinates(), Coordinates::new(10.0, 20.0));
    }

    #[test]
    fn test_update_uri_errors() {
        let test = create_test_store();
        let store = &test.store;

        let id = store
            .create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0))
            .unwrap();
        assert!(matches!(
            store.update_uri(id, ""),
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            store.update_uri(MediaId(99), "x.jpg"),
            Err(CatalogError::NotFound(MediaId(99)))
        ));
        assert_eq!(store.get(id).unwrap().uri, "a.jpg");
    }

    #[test]
    fn test_delete_twice_is_not_found() {
        let test = create_test_store();
        let store = &test.store;

        let id = store
            .create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0))
            .unwrap();
        store.delete(id).unwrap();
        assert!(matches!(store.get(id), Err(CatalogError::NotFound(_))));
        assert!(matches!(store.delete(id), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_ids_are_not_reused_after_deleting_the_newest() {
        let test = create_test_store();
        let store = &test.store;

        let first = store
            .create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0))
            .unwrap();
        let second = store
            .create(&new_record("b.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0))
            .unwrap();
        store.delete(second).unwrap();

        let third = store
            .create(&new_record("c.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0))
            .unwrap();
        assert!(third > second);
        assert!(second > first);
    }

    #[test]
    fn test_list_all_and_markers_are_id_ordered() {
        let test = create_test_store();
        let store = &test.store;

        let ids: Vec<MediaId> = (0..5)
            .map(|i| {
                store
                    .create(&new_record(
                        &format!("{}.jpg", i),
                        "2024-01-01T00:00:00Z",
                        i as f64,
                        -(i as f64),
                    ))
                    .unwrap()
            })
            .collect();
        store.delete(ids[2]).unwrap();

        let listed: Vec<MediaId> = store.list_all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![ids[0], ids[1], ids[3], ids[4]]);

        let markers = store.map_markers().unwrap();
        assert_eq!(markers.len(), 4);
        assert_eq!(
            markers[2],
            MapMarker {
                latitude: 3.0,
                longitude: -3.0,
                id: ids[3]
            }
        );
    }

    #[test]
    fn test_closed_store_reports_not_initialized() {
        let test = create_test_store();
        let store = &test.store;

        store.close().unwrap();
        assert!(matches!(store.count(), Err(CatalogError::NotInitialized)));
        assert!(matches!(
            store.create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 0.0, 0.0)),
            Err(CatalogError::NotInitialized)
        ));
        // Closing again is a no-op
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_keeps_records() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("media.db");

        let store = SqliteMediaStore::open(&db_path, &StoreOptions::default()).unwrap();
        let id = store
            .create(&new_record("a.jpg", "2024-01-01T00:00:00Z", 5.0, 6.0))
            .unwrap();
        store.close().unwrap();

        let reopened = SqliteMediaStore::open(&db_path, &StoreOptions::default()).unwrap();
        assert_eq!(reopened.get(id).unwrap().uri, "a.jpg");
    }

    #[test]
    fn test_second_open_of_same_location_fails() {
        let test = create_test_store();
        let err = SqliteMediaStore::open(test.store.location(), &StoreOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, CatalogError::StorageUnavailable(_)));
    }

    #[test]
    fn test_foreign_database_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("other.db");
        {
            let conn = Connection::open(&db_path).unwrap();
            conn.execute("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)", [])
                .unwrap();
        }

        let err = SqliteMediaStore::open(&db_path, &StoreOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, CatalogError::StorageUnavailable(_)));
    }

    #[test]
    fn test_empty_existing_file_is_initialized() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("empty.db");
        std::fs::write(&db_path, b"").unwrap();

        let store = SqliteMediaStore::open(&db_path, &StoreOptions::default()).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}

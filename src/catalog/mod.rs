//! Process-wide media catalog handle.
//!
//! `MediaCatalog` owns the one open store and hands out asynchronous
//! operations over it. Clones share the same store. Blocking engine work runs
//! on the tokio blocking pool, so callers on the runtime are never stalled
//! by disk I/O.

pub mod search;

use crate::media_store::{
    resolve_location, CatalogError, CatalogResult, MapMarker, MediaId, MediaRecord, MediaStore,
    NewMediaRecord, SqliteMediaStore, StoreOptions,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Clone, Default)]
pub struct MediaCatalog {
    store: Arc<Mutex<Option<Arc<dyn MediaStore>>>>,
}

impl std::fmt::Debug for MediaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaCatalog").finish_non_exhaustive()
    }
}

impl MediaCatalog {
    /// An uninitialized handle. Every CRUD call fails with `NotInitialized`
    /// until `initialize` succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for `new` followed by `initialize`.
    pub async fn open<P: AsRef<Path>>(location: P, options: StoreOptions) -> CatalogResult<Self> {
        let catalog = Self::new();
        catalog.initialize(location, options).await?;
        Ok(catalog)
    }

    /// Wraps an already open store.
    pub fn with_store(store: Arc<dyn MediaStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(Some(store))),
        }
    }

    /// Opens the store at `location`, creating it and its schema if absent.
    ///
    /// Calling this again for the location that is already open is a no-op.
    /// Asking for a different location while one is open fails with
    /// `StorageUnavailable`; `close` first.
    pub async fn initialize<P: AsRef<Path>>(
        &self,
        location: P,
        options: StoreOptions,
    ) -> CatalogResult<()> {
        let location = location.as_ref().to_path_buf();

        // Held across the open so two initializers cannot race for the slot
        let mut slot = self.store.lock().await;

        if let Some(current) = slot.as_ref() {
            let requested = run_blocking({
                let location = location.clone();
                move || resolve_location(&location)
            })
            .await?;
            if requested == current.location() {
                debug!("Media catalog already initialized at {:?}", requested);
                return Ok(());
            }
            return Err(CatalogError::StorageUnavailable(format!(
                "catalog is open at {:?}, cannot initialize at {:?}",
                current.location(),
                requested
            )));
        }

        let store: Arc<dyn MediaStore> = Arc::new(
            run_blocking(move || SqliteMediaStore::open(&location, &options)).await?,
        );
        let count = run_blocking({
            let store = store.clone();
            move || store.count()
        })
        .await?;
        *slot = Some(store);
        info!("Media catalog ready with {} records", count);
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        self.store.lock().await.is_some()
    }

    /// Location of the open store, if any.
    pub async fn location(&self) -> Option<PathBuf> {
        self.store
            .lock()
            .await
            .as_ref()
            .map(|s| s.location().to_path_buf())
    }

    /// Releases the store. Waits for the statement currently holding the
    /// connection, if any. A no-op on a closed or never-opened handle.
    pub async fn close(&self) -> CatalogResult<()> {
        let taken = self.store.lock().await.take();
        match taken {
            Some(store) => run_blocking(move || store.close()).await,
            None => Ok(()),
        }
    }

    async fn current_store(&self) -> CatalogResult<Arc<dyn MediaStore>> {
        self.store
            .lock()
            .await
            .clone()
            .ok_or(CatalogError::NotInitialized)
    }

    async fn run<T, F>(&self, op: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn MediaStore) -> CatalogResult<T> + Send + 'static,
    {
        let store = self.current_store().await?;
        run_blocking(move || op(store.as_ref())).await
    }

    /// Inserts a new record and returns its id. The id is only returned once
    /// the insert has committed.
    pub async fn create(&self, record: NewMediaRecord) -> CatalogResult<MediaId> {
        self.run(move |store| store.create(&record)).await
    }

    pub async fn read(&self, id: MediaId) -> CatalogResult<MediaRecord> {
        self.run(move |store| store.get(id)).await
    }

    /// Every record, ascending by id (insertion order).
    pub async fn read_all(&self) -> CatalogResult<Vec<MediaRecord>> {
        self.run(|store| store.list_all()).await
    }

    /// Re-points a record at a replacement image. Time and location stay.
    pub async fn update_uri(&self, id: MediaId, new_uri: impl Into<String>) -> CatalogResult<()> {
        let new_uri = new_uri.into();
        self.run(move |store| store.update_uri(id, &new_uri)).await
    }

    pub async fn delete(&self, id: MediaId) -> CatalogResult<()> {
        self.run(move |store| store.delete(id)).await
    }

    /// Records whose capture time or coordinates contain `query`,
    /// in the same order as `read_all`.
    pub async fn search(&self, query: &str) -> CatalogResult<Vec<MediaRecord>> {
        let query = query.to_string();
        self.run(move |store| Ok(search::filter_records(store.list_all()?, &query)))
            .await
    }

    /// Marker positions of every record, ascending by id.
    pub async fn spatial_snapshot(&self) -> CatalogResult<Vec<MapMarker>> {
        self.run(|store| store.map_markers()).await
    }

    pub async fn count(&self) -> CatalogResult<u64> {
        self.run(|store| store.count()).await
    }
}

async fn run_blocking<T, F>(f: F) -> CatalogResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> CatalogResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CatalogError::TransactionFailed(format!("catalog task aborted: {}", e)))?
}

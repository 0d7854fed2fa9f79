//! Turns a capture event into a catalog record.
//!
//! The camera and the location sensor live outside this crate; they are
//! reached through `CaptureProvider` and `LocationProvider`. A record is only
//! written when both succeed, so a missing fix never produces a record with
//! made-up coordinates.

use crate::catalog::MediaCatalog;
use crate::media_store::{CatalogError, Coordinates, MediaRecord, NewMediaRecord};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// What the capture flow hands back: where the bytes are and when they were taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub uri: String,
    pub timestamp: String,
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("No position fix: {0}")]
    NoFix(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    /// The image exists at `uri` but no record was written for it.
    #[error("Location unavailable for {uri}: {source}")]
    LocationUnavailable {
        uri: String,
        #[source]
        source: LocationError,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[async_trait]
pub trait CaptureProvider: Send + Sync {
    async fn capture(&self) -> Result<CapturedImage, CaptureError>;
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Coordinates, LocationError>;
}

/// Capture time in the form the catalog stores, e.g. `2024-01-01T09:30:00.000Z`.
pub fn capture_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Capture provider for an image that is already on disk or behind a URI.
pub struct ExistingImage {
    uri: String,
    timestamp: Option<String>,
}

impl ExistingImage {
    /// `timestamp` defaults to the moment `capture` is called.
    pub fn new(uri: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            uri: uri.into(),
            timestamp,
        }
    }
}

#[async_trait]
impl CaptureProvider for ExistingImage {
    async fn capture(&self) -> Result<CapturedImage, CaptureError> {
        Ok(CapturedImage {
            uri: self.uri.clone(),
            timestamp: self
                .timestamp
                .clone()
                .unwrap_or_else(|| capture_timestamp(Utc::now())),
        })
    }
}

/// Location provider that always reports the same position.
pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Coordinates, LocationError> {
        Ok(self.0)
    }
}

pub struct CaptureService {
    catalog: MediaCatalog,
    capture: Arc<dyn CaptureProvider>,
    location: Arc<dyn LocationProvider>,
}

impl CaptureService {
    pub fn new(
        catalog: MediaCatalog,
        capture: Arc<dyn CaptureProvider>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            catalog,
            capture,
            location,
        }
    }

    /// Captures one image, locates it and records it.
    pub async fn capture_and_record(&self) -> Result<MediaRecord, CaptureError> {
        let image = self.capture.capture().await?;

        let coordinates = match self.location.current_position().await {
            Ok(coordinates) => coordinates,
            Err(source) => {
                warn!("Not recording {}: {}", image.uri, source);
                return Err(CaptureError::LocationUnavailable {
                    uri: image.uri,
                    source,
                });
            }
        };

        let new_record = NewMediaRecord::new(image.uri, image.timestamp, coordinates);
        let id = self.catalog.create(new_record.clone()).await?;
        info!("Recorded capture {} as media record {}", new_record.uri, id);
        Ok(new_record.into_record(id))
    }
}

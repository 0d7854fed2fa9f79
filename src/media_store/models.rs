use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identifier of a media record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub i64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A location reading, as produced by a location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A persisted media record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: MediaId,
    /// Filesystem path or content URI of the image bytes.
    pub uri: String,
    /// Capture time, kept exactly as supplied (RFC 3339).
    pub captured_at: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl MediaRecord {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Input of a Create call. The id is assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMediaRecord {
    pub uri: String,
    pub captured_at: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewMediaRecord {
    pub fn new(
        uri: impl Into<String>,
        captured_at: impl Into<String>,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            uri: uri.into(),
            captured_at: captured_at.into(),
            latitude: coordinates.latitude,
            longitude: coordinates.longitude,
        }
    }

    pub fn into_record(self, id: MediaId) -> MediaRecord {
        MediaRecord {
            id,
            uri: self.uri,
            captured_at: self.captured_at,
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Projection of a record used to place a map marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapMarker {
    pub latitude: f64,
    pub longitude: f64,
    pub id: MediaId,
}

/// Tuning knobs for opening the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    pub busy_timeout_ms: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
        }
    }
}

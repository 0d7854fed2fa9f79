//! Validation for media records.
//!
//! Runs before anything touches the database, so a rejected record
//! never opens a transaction.

use super::models::NewMediaRecord;
use chrono::DateTime;
use std::fmt;

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyField {
        field: &'static str,
    },
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    InvalidTimestamp {
        value: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(
                    f,
                    "Field '{}' must be within [{}, {}], got {}",
                    field, min, max, value
                )
            }
            ValidationError::InvalidTimestamp { value } => {
                write!(f, "'{}' is not an RFC 3339 timestamp", value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

pub fn validate_uri(uri: &str) -> ValidationResult<()> {
    if uri.trim().is_empty() {
        return Err(ValidationError::EmptyField { field: "uri" });
    }
    Ok(())
}

pub fn validate_captured_at(captured_at: &str) -> ValidationResult<()> {
    if captured_at.trim().is_empty() {
        return Err(ValidationError::EmptyField {
            field: "captured_at",
        });
    }
    DateTime::parse_from_rfc3339(captured_at).map_err(|_| ValidationError::InvalidTimestamp {
        value: captured_at.to_string(),
    })?;
    Ok(())
}

fn validate_in_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> ValidationResult<()> {
    // NaN fails `contains`, so it is rejected here too
    if !(min..=max).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> ValidationResult<()> {
    validate_in_range("latitude", latitude, LATITUDE_RANGE)?;
    validate_in_range("longitude", longitude, LONGITUDE_RANGE)
}

/// Validate a record before insertion
pub fn validate_new_record(record: &NewMediaRecord) -> ValidationResult<()> {
    validate_uri(&record.uri)?;
    validate_captured_at(&record.captured_at)?;
    validate_coordinates(record.latitude, record.longitude)
}

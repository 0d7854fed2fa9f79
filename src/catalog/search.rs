//! Free-text filter over media records.
//!
//! A record matches when the query is a case-sensitive substring of its
//! capture time, its latitude or its longitude (as decimal strings).
//! The empty query matches everything.

use crate::media_store::MediaRecord;

/// Decimal string of a coordinate as used for matching.
///
/// Shortest round-trip digits, always carrying a fractional part:
/// `40.0` renders as `"40.0"`, `-122.4324` as `"-122.4324"`.
pub fn decimal_repr(value: f64) -> String {
    let mut repr = value.to_string();
    if value.is_finite() && !repr.contains('.') {
        repr.push_str(".0");
    }
    repr
}

pub fn matches(record: &MediaRecord, query: &str) -> bool {
    record.captured_at.contains(query)
        || decimal_repr(record.latitude).contains(query)
        || decimal_repr(record.longitude).contains(query)
}

/// Keeps the matching records, preserving their order.
pub fn filter_records(records: Vec<MediaRecord>, query: &str) -> Vec<MediaRecord> {
    if query.is_empty() {
        return records;
    }
    records.into_iter().filter(|r| matches(r, query)).collect()
}

//! Stream record definitions
//!
//! Document-store records arrive as loose maps with heterogeneous timestamp
//! representations. This module pins them down at the ingestion boundary:
//! - timestamps become a tagged union resolved exactly once by the Time
//!   Normalizer, so no downstream stage branches on timestamp shape again
//! - each stream gets a strongly-typed optional-field struct with explicit
//!   defaults, so the Aligner stays free of presence checks
//!
//! Unknown extra fields on any record are tolerated and ignored.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// A timestamp as it appears in the store, before normalization.
///
/// Variants are tried in declaration order during deserialization, so the
/// store-native object shape must come before the plain number and string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Store-native timestamp object (Firestore-style seconds/nanos pair)
    Native {
        seconds: i64,
        #[serde(default)]
        nanos: u32,
    },
    /// Numeric Unix epoch, fractional seconds allowed
    Epoch(f64),
    /// ISO-8601 string, optionally suffixed with a literal "Z".
    /// Naive strings are assumed UTC.
    Iso(String),
    /// Any other shape; rejected by the Time Normalizer
    Other(serde_json::Value),
}

/// One CGM reading. The driving stream: every unified row starts here.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GlucoseRecord {
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    /// Glucose value in the unit declared by the request
    #[serde(default)]
    pub glucose: Option<f64>,
}

impl GlucoseRecord {
    /// Check that this record can drive a unified row.
    ///
    /// The Aligner skips invalid records silently; this is for callers that
    /// want the missing field named.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timestamp.is_none() {
            return Err(EngineError::MalformedRecord("timestamp".to_string()));
        }
        if self.glucose.is_none() {
            return Err(EngineError::MalformedRecord("glucose".to_string()));
        }
        Ok(())
    }
}

/// One activity sample (steps and heart rate)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivityRecord {
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub steps: Option<u32>,
    #[serde(default)]
    pub heart_rate: Option<u32>,
}

impl ActivityRecord {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timestamp.is_none() {
            return Err(EngineError::MalformedRecord("timestamp".to_string()));
        }
        Ok(())
    }
}

/// One insulin dosing event, with the carbohydrates logged alongside it
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InsulinRecord {
    #[serde(default)]
    pub timestamp: Option<RawTimestamp>,
    #[serde(default)]
    pub bolus_units: Option<f64>,
    #[serde(default)]
    pub basal_units: Option<f64>,
    #[serde(default)]
    pub carbs_g: Option<f64>,
}

impl InsulinRecord {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.timestamp.is_none() {
            return Err(EngineError::MalformedRecord("timestamp".to_string()));
        }
        Ok(())
    }
}

/// The three stream collections fetched for a single request.
///
/// Immutable once fetched; request-scoped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RecordBatch {
    #[serde(default)]
    pub glucose: Vec<GlucoseRecord>,
    #[serde(default)]
    pub activity: Vec<ActivityRecord>,
    #[serde(default)]
    pub insulin: Vec<InsulinRecord>,
}

impl RecordBatch {
    /// Parse a batch from a JSON document with `glucose`/`activity`/`insulin`
    /// arrays. Missing arrays default to empty.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let batch = serde_json::from_str(json)?;
        Ok(batch)
    }

    pub fn is_empty(&self) -> bool {
        self.glucose.is_empty() && self.activity.is_empty() && self.insulin.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_dispatch_by_shape() {
        let native: RawTimestamp =
            serde_json::from_str(r#"{"seconds": 1704067200, "nanos": 500000000}"#).unwrap();
        assert_eq!(
            native,
            RawTimestamp::Native {
                seconds: 1704067200,
                nanos: 500000000
            }
        );

        let epoch: RawTimestamp = serde_json::from_str("1704067200.5").unwrap();
        assert_eq!(epoch, RawTimestamp::Epoch(1704067200.5));

        let iso: RawTimestamp = serde_json::from_str(r#""2024-01-01T00:00:00Z""#).unwrap();
        assert_eq!(iso, RawTimestamp::Iso("2024-01-01T00:00:00Z".to_string()));

        // Unrecognized shapes fall into the catch-all instead of failing parse
        let other: RawTimestamp = serde_json::from_str(r#"{"weird": true}"#).unwrap();
        assert!(matches!(other, RawTimestamp::Other(_)));
    }

    #[test]
    fn test_glucose_record_validation_names_missing_field() {
        let missing_ts: GlucoseRecord = serde_json::from_str(r#"{"glucose": 120.0}"#).unwrap();
        let err = missing_ts.validate().unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(ref f) if f == "timestamp"));

        let missing_glucose: GlucoseRecord =
            serde_json::from_str(r#"{"timestamp": "2024-01-01T00:00:00Z"}"#).unwrap();
        let err = missing_glucose.validate().unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord(ref f) if f == "glucose"));
    }

    #[test]
    fn test_batch_tolerates_extra_fields_and_missing_arrays() {
        let json = r#"{
            "glucose": [
                {"timestamp": "2024-01-01T00:00:00Z", "glucose": 110.0, "_id": "doc-1", "user_id": "u1"}
            ]
        }"#;
        let batch = RecordBatch::from_json(json).unwrap();
        assert_eq!(batch.glucose.len(), 1);
        assert!(batch.activity.is_empty());
        assert!(batch.insulin.is_empty());
        assert_eq!(batch.glucose[0].glucose, Some(110.0));
    }
}

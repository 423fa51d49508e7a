//! Timestamp normalization
//!
//! This module resolves the heterogeneous timestamp representations found in
//! store records into a single canonical UTC instant:
//! - store-native seconds/nanos objects
//! - numeric Unix epochs (fractional seconds allowed)
//! - ISO-8601 strings, with or without an offset (naive strings assumed UTC)
//!
//! It also derives the per-minute bucket key the Aligner joins on.

use crate::error::EngineError;
use crate::schema::RawTimestamp;
use crate::types::SECS_PER_MINUTE;
use chrono::{DateTime, NaiveDateTime, Utc};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Normalizer for converting raw timestamps to canonical UTC instants
pub struct TimeNormalizer;

impl TimeNormalizer {
    /// Resolve a raw timestamp into a UTC-aware instant.
    ///
    /// Fails with `UnsupportedTimestampType` when the value is none of the
    /// recognized shapes or falls outside the representable range.
    pub fn normalize(ts: &RawTimestamp) -> Result<DateTime<Utc>, EngineError> {
        match ts {
            RawTimestamp::Native { seconds, nanos } => {
                DateTime::<Utc>::from_timestamp(*seconds, *nanos).ok_or_else(|| {
                    EngineError::UnsupportedTimestampType(format!(
                        "native timestamp out of range: {seconds}s {nanos}ns"
                    ))
                })
            }
            RawTimestamp::Epoch(epoch) => normalize_epoch(*epoch),
            RawTimestamp::Iso(text) => parse_iso(text),
            RawTimestamp::Other(value) => Err(EngineError::UnsupportedTimestampType(
                value.to_string(),
            )),
        }
    }

    /// Render an instant as the canonical ISO-8601 UTC string.
    ///
    /// Always carries the `+00:00` offset, so lexical ordering of canonical
    /// strings equals chronological ordering.
    pub fn to_canonical_iso(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    /// Minute bucket key: UTC epoch seconds with seconds and sub-seconds
    /// zeroed. Two instants within the same UTC minute collide deliberately.
    pub fn minute_key(dt: &DateTime<Utc>) -> i64 {
        let secs = dt.timestamp();
        secs - secs.rem_euclid(SECS_PER_MINUTE)
    }
}

fn normalize_epoch(epoch: f64) -> Result<DateTime<Utc>, EngineError> {
    if !epoch.is_finite() {
        return Err(EngineError::UnsupportedTimestampType(format!(
            "non-finite epoch: {epoch}"
        )));
    }
    let mut secs = epoch.floor() as i64;
    let mut nanos = ((epoch - epoch.floor()) * NANOS_PER_SEC).round() as u32;
    if nanos >= NANOS_PER_SEC as u32 {
        secs += 1;
        nanos = 0;
    }
    DateTime::<Utc>::from_timestamp(secs, nanos).ok_or_else(|| {
        EngineError::UnsupportedTimestampType(format!("epoch out of range: {epoch}"))
    })
}

fn parse_iso(text: &str) -> Result<DateTime<Utc>, EngineError> {
    // Offset-aware form first; covers the literal "Z" suffix
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Naive instants are assumed UTC
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(EngineError::UnsupportedTimestampType(format!(
        "unparseable ISO-8601 string: {text}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_normalize_native_object() {
        let ts = RawTimestamp::Native {
            seconds: 1704067230,
            nanos: 0,
        };
        let dt = TimeNormalizer::normalize(&ts).unwrap();
        assert_eq!(TimeNormalizer::to_canonical_iso(&dt), "2024-01-01T00:00:30+00:00");
    }

    #[test]
    fn test_normalize_fractional_epoch() {
        let ts = RawTimestamp::Epoch(1704067230.25);
        let dt = TimeNormalizer::normalize(&ts).unwrap();
        assert_eq!(dt.timestamp(), 1704067230);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_normalize_iso_variants() {
        let zulu = RawTimestamp::Iso("2024-01-01T00:00:30Z".to_string());
        let offset = RawTimestamp::Iso("2024-01-01T01:00:30+01:00".to_string());
        let naive = RawTimestamp::Iso("2024-01-01T00:00:30".to_string());

        let a = TimeNormalizer::normalize(&zulu).unwrap();
        let b = TimeNormalizer::normalize(&offset).unwrap();
        let c = TimeNormalizer::normalize(&naive).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_unrecognized_shape_is_rejected() {
        let ts = RawTimestamp::Other(serde_json::json!({"weird": true}));
        let err = TimeNormalizer::normalize(&ts).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTimestampType(_)));

        let garbage = RawTimestamp::Iso("not a timestamp".to_string());
        let err = TimeNormalizer::normalize(&garbage).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedTimestampType(_)));
    }

    #[test]
    fn test_minute_key_collides_within_minute() {
        let a = TimeNormalizer::normalize(&RawTimestamp::Iso(
            "2024-01-01T00:00:30Z".to_string(),
        ))
        .unwrap();
        let b = TimeNormalizer::normalize(&RawTimestamp::Iso(
            "2024-01-01T00:00:45Z".to_string(),
        ))
        .unwrap();
        let c = TimeNormalizer::normalize(&RawTimestamp::Iso(
            "2024-01-01T00:01:00Z".to_string(),
        ))
        .unwrap();

        assert_eq!(TimeNormalizer::minute_key(&a), TimeNormalizer::minute_key(&b));
        assert_ne!(TimeNormalizer::minute_key(&a), TimeNormalizer::minute_key(&c));
        assert_eq!(TimeNormalizer::minute_key(&a) % 60, 0);
    }

    #[test]
    fn test_canonical_iso_sorts_chronologically() {
        let earlier = TimeNormalizer::normalize(&RawTimestamp::Epoch(1704067200.0)).unwrap();
        let later = TimeNormalizer::normalize(&RawTimestamp::Epoch(1704067260.0)).unwrap();
        assert!(
            TimeNormalizer::to_canonical_iso(&earlier) < TimeNormalizer::to_canonical_iso(&later)
        );
    }
}

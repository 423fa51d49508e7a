//! Record alignment
//!
//! This module merges the three independently-timestamped streams into one
//! ordered sequence of unified rows keyed by minute-truncated timestamp.
//!
//! Glucose is the driving stream: exactly one row is emitted per glucose
//! record that carries both a timestamp and a value. Activity and insulin
//! records join on the glucose record's minute key only; there is no
//! backward or forward search window. Records that cannot be placed on the
//! timeline are dropped silently, matching real-world sensor gaps.

use crate::features::FeatureDeriver;
use crate::normalizer::TimeNormalizer;
use crate::schema::{ActivityRecord, InsulinRecord, RawTimestamp, RecordBatch};
use crate::types::{GlucoseUnit, UnifiedRow, MGDL_PER_MMOL};
use std::collections::HashMap;

/// Counts of records dropped during one alignment pass.
///
/// Dropping is the documented policy, not an error; the counts exist so
/// callers can surface sensor gaps in logs or diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlignStats {
    /// Glucose records skipped (missing timestamp/value or bad timestamp)
    pub glucose_skipped: usize,
    /// Activity records that never made it into the minute map
    pub activity_skipped: usize,
    /// Insulin records that never made it into the minute map
    pub insulin_skipped: usize,
}

/// Aligner for merging the three record streams
pub struct Aligner;

impl Aligner {
    /// Merge a batch into sorted unified rows.
    pub fn align(batch: &RecordBatch, unit: GlucoseUnit) -> Vec<UnifiedRow> {
        Self::align_counted(batch, unit).0
    }

    /// Merge a batch, also reporting how many records were dropped.
    pub fn align_counted(batch: &RecordBatch, unit: GlucoseUnit) -> (Vec<UnifiedRow>, AlignStats) {
        let mut stats = AlignStats::default();

        // Minute-key maps for the joined streams. Later records overwrite
        // earlier ones on the same key (last-write-wins, a deliberate lossy
        // simplification rather than nearest-neighbor matching).
        let mut activity_by_minute: HashMap<i64, &ActivityRecord> = HashMap::new();
        for record in &batch.activity {
            match minute_key_of(record.timestamp.as_ref()) {
                Some(key) => {
                    activity_by_minute.insert(key, record);
                }
                None => stats.activity_skipped += 1,
            }
        }

        let mut insulin_by_minute: HashMap<i64, &InsulinRecord> = HashMap::new();
        for record in &batch.insulin {
            match minute_key_of(record.timestamp.as_ref()) {
                Some(key) => {
                    insulin_by_minute.insert(key, record);
                }
                None => stats.insulin_skipped += 1,
            }
        }

        let unit_factor = match unit {
            GlucoseUnit::MmolL => MGDL_PER_MMOL,
            GlucoseUnit::MgDl => 1.0,
        };

        let mut rows = Vec::with_capacity(batch.glucose.len());
        for record in &batch.glucose {
            let (raw_ts, glucose) = match (record.timestamp.as_ref(), record.glucose) {
                (Some(ts), Some(value)) => (ts, value),
                _ => {
                    stats.glucose_skipped += 1;
                    continue;
                }
            };
            let instant = match TimeNormalizer::normalize(raw_ts) {
                Ok(dt) => dt,
                Err(_) => {
                    stats.glucose_skipped += 1;
                    continue;
                }
            };

            let glucose_mgdl = glucose * unit_factor;
            let key = TimeNormalizer::minute_key(&instant);

            let activity = activity_by_minute.get(&key);
            let insulin = insulin_by_minute.get(&key);

            let carbs_g = insulin.and_then(|i| i.carbs_g).unwrap_or(0.0);
            let (circadian_sin, circadian_cos) = FeatureDeriver::circadian(&instant);

            rows.push(UnifiedRow {
                timestamp: TimeNormalizer::to_canonical_iso(&instant),
                glucose_mgdl,
                steps: activity.and_then(|a| a.steps).unwrap_or(0),
                heart_rate: activity.and_then(|a| a.heart_rate).unwrap_or(0),
                bolus_units: insulin.and_then(|i| i.bolus_units).unwrap_or(0.0),
                basal_units: insulin.and_then(|i| i.basal_units).unwrap_or(0.0),
                carbs_g,
                circadian_sin,
                circadian_cos,
                glucose_carb_ratio: FeatureDeriver::glucose_carb_ratio(glucose_mgdl, carbs_g),
            });
        }

        // Canonical ISO UTC strings sort chronologically
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

        (rows, stats)
    }
}

fn minute_key_of(ts: Option<&RawTimestamp>) -> Option<i64> {
    let instant = TimeNormalizer::normalize(ts?).ok()?;
    Some(TimeNormalizer::minute_key(&instant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GlucoseRecord;
    use pretty_assertions::assert_eq;

    fn iso(ts: &str) -> Option<RawTimestamp> {
        Some(RawTimestamp::Iso(ts.to_string()))
    }

    fn glucose(ts: &str, value: f64) -> GlucoseRecord {
        GlucoseRecord {
            timestamp: iso(ts),
            glucose: Some(value),
        }
    }

    fn activity(ts: &str, steps: u32, heart_rate: u32) -> ActivityRecord {
        ActivityRecord {
            timestamp: iso(ts),
            steps: Some(steps),
            heart_rate: Some(heart_rate),
        }
    }

    fn insulin(ts: &str, bolus: f64, basal: f64, carbs: f64) -> InsulinRecord {
        InsulinRecord {
            timestamp: iso(ts),
            bolus_units: Some(bolus),
            basal_units: Some(basal),
            carbs_g: Some(carbs),
        }
    }

    #[test]
    fn test_same_minute_records_join() {
        let batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:30Z", 110.0)],
            activity: vec![activity("2024-01-01T00:00:45Z", 120, 72)],
            insulin: vec![insulin("2024-01-01T00:00:10Z", 2.5, 0.8, 45.0)],
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.timestamp, "2024-01-01T00:00:30+00:00");
        assert_eq!(row.glucose_mgdl, 110.0);
        assert_eq!(row.steps, 120);
        assert_eq!(row.heart_rate, 72);
        assert_eq!(row.bolus_units, 2.5);
        assert_eq!(row.basal_units, 0.8);
        assert_eq!(row.carbs_g, 45.0);
        // 110 / 45 rounded to 3 decimals
        assert_eq!(row.glucose_carb_ratio, 2.444);
    }

    #[test]
    fn test_unmatched_minutes_get_defaults() {
        let batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:05:00Z", 120.0)],
            activity: vec![activity("2024-01-01T00:04:00Z", 500, 90)],
            insulin: vec![],
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.steps, 0);
        assert_eq!(row.heart_rate, 0);
        assert_eq!(row.bolus_units, 0.0);
        assert_eq!(row.basal_units, 0.0);
        assert_eq!(row.carbs_g, 0.0);
        // Fallback divisor of 1.0 when no carbs joined
        assert_eq!(row.glucose_carb_ratio, 120.0);
    }

    #[test]
    fn test_mmol_input_is_converted_with_fixed_constant() {
        let batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:00Z", 6.5)],
            ..Default::default()
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MmolL);
        assert_eq!(rows[0].glucose_mgdl, 6.5 * 18.0);
    }

    #[test]
    fn test_unit_conversion_round_trip_law() {
        let mmol_batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:00Z", 6.5)],
            ..Default::default()
        };
        let premultiplied = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:00Z", 6.5 * 18.0)],
            ..Default::default()
        };

        let from_mmol = Aligner::align(&mmol_batch, GlucoseUnit::MmolL);
        let from_mgdl = Aligner::align(&premultiplied, GlucoseUnit::MgDl);
        assert_eq!(from_mmol, from_mgdl);
    }

    #[test]
    fn test_output_sorted_ascending_regardless_of_input_order() {
        // Sources return records newest-first; alignment re-sorts
        let batch = RecordBatch {
            glucose: vec![
                glucose("2024-01-01T00:10:00Z", 130.0),
                glucose("2024-01-01T00:00:00Z", 110.0),
                glucose("2024-01-01T00:05:00Z", 120.0),
            ],
            ..Default::default()
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MgDl);
        let timestamps: Vec<&str> = rows.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            timestamps,
            vec![
                "2024-01-01T00:00:00+00:00",
                "2024-01-01T00:05:00+00:00",
                "2024-01-01T00:10:00+00:00",
            ]
        );
    }

    #[test]
    fn test_empty_glucose_means_empty_output() {
        // Glucose drives the join; orphan activity/insulin records are dropped
        let batch = RecordBatch {
            glucose: vec![],
            activity: vec![activity("2024-01-01T00:00:00Z", 100, 70)],
            insulin: vec![insulin("2024-01-01T00:00:00Z", 1.0, 0.5, 30.0)],
        };

        assert!(Aligner::align(&batch, GlucoseUnit::MgDl).is_empty());
    }

    #[test]
    fn test_malformed_records_are_skipped_not_fatal() {
        let batch = RecordBatch {
            glucose: vec![
                GlucoseRecord {
                    timestamp: None,
                    glucose: Some(100.0),
                },
                GlucoseRecord {
                    timestamp: iso("2024-01-01T00:00:00Z"),
                    glucose: None,
                },
                GlucoseRecord {
                    timestamp: Some(RawTimestamp::Other(serde_json::json!(["nope"]))),
                    glucose: Some(100.0),
                },
                glucose("2024-01-01T00:01:00Z", 115.0),
            ],
            activity: vec![ActivityRecord {
                timestamp: None,
                steps: Some(10),
                heart_rate: None,
            }],
            insulin: vec![],
        };

        let (rows, stats) = Aligner::align_counted(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].glucose_mgdl, 115.0);
        assert_eq!(stats.glucose_skipped, 3);
        assert_eq!(stats.activity_skipped, 1);
        assert_eq!(stats.insulin_skipped, 0);
    }

    #[test]
    fn test_same_minute_duplicate_is_last_write_wins() {
        // Known lossy edge case: a stream reporting twice within one minute
        // keeps only the later record from input order.
        let batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:30Z", 110.0)],
            activity: vec![
                activity("2024-01-01T00:00:05Z", 100, 70),
                activity("2024-01-01T00:00:55Z", 250, 95),
            ],
            insulin: vec![],
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows[0].steps, 250);
        assert_eq!(rows[0].heart_rate, 95);
    }

    #[test]
    fn test_mixed_timestamp_shapes_land_in_one_bucket() {
        // 2024-01-01T00:00:xxZ expressed three different ways
        let batch = RecordBatch {
            glucose: vec![glucose("2024-01-01T00:00:30Z", 105.0)],
            activity: vec![ActivityRecord {
                timestamp: Some(RawTimestamp::Epoch(1704067245.0)),
                steps: Some(42),
                heart_rate: Some(88),
            }],
            insulin: vec![InsulinRecord {
                timestamp: Some(RawTimestamp::Native {
                    seconds: 1704067210,
                    nanos: 0,
                }),
                bolus_units: Some(1.5),
                basal_units: None,
                carbs_g: Some(20.0),
            }],
        };

        let rows = Aligner::align(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].steps, 42);
        assert_eq!(rows[0].bolus_units, 1.5);
        assert_eq!(rows[0].carbs_g, 20.0);
    }
}

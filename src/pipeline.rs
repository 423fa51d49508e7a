//! Pipeline orchestration
//!
//! This module provides the public API for Glykos: the four core operations
//! exposed to HTTP glue and other callers, plus a stateful [`FeatureEngine`]
//! that stamps dashboard snapshots with provenance metadata.
//!
//! Pipeline stages:
//! 1. Time Normalizer - resolve heterogeneous timestamps once, at ingestion
//! 2. Aligner - minute-bucket join of the three streams, glucose-driven
//! 3. Feature Deriver - circadian phase and glucose/carb ratio per row
//! 4. Sequencer / Score Engine - windowed sequences and heuristic scores

use crate::aligner::{AlignStats, Aligner};
use crate::error::EngineError;
use crate::schema::RecordBatch;
use crate::scores::ScoreEngine;
use crate::sequencer::Sequencer;
use crate::types::{
    DashboardSnapshot, GlucoseUnit, IsfMethod, ScoreResult, SensitivityFactor, SequenceWindow,
    SnapshotProducer, SnapshotSeries, UnifiedRow,
};
use crate::{GLYKOS_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// Number of trailing rows a dashboard snapshot covers
pub const SNAPSHOT_SPAN: usize = 24;

/// Merge the three record streams into sorted unified rows.
pub fn align_records(batch: &RecordBatch, unit: GlucoseUnit) -> Vec<UnifiedRow> {
    Aligner::align(batch, unit)
}

/// Like [`align_records`], also reporting dropped-record counts.
pub fn align_records_counted(
    batch: &RecordBatch,
    unit: GlucoseUnit,
) -> (Vec<UnifiedRow>, AlignStats) {
    Aligner::align_counted(batch, unit)
}

/// Slide a fixed-size window over sorted rows.
pub fn derive_sequences(
    rows: &[UnifiedRow],
    window: usize,
) -> Result<Vec<SequenceWindow>, EngineError> {
    Sequencer::derive(rows, window)
}

/// Insulin Sensitivity Score over independent glucose/insulin series.
pub fn compute_sensitivity_score(glucose_mgdl: &[f64], insulin_units: &[f64]) -> ScoreResult {
    ScoreEngine::sensitivity_score(glucose_mgdl, insulin_units)
}

/// Insulin Sensitivity Factor from total daily dose.
pub fn compute_sensitivity_factor(
    method: IsfMethod,
    total_daily_dose: f64,
) -> Result<SensitivityFactor, EngineError> {
    ScoreEngine::sensitivity_factor(method, total_daily_dose)
}

/// Convert a glucose series to mg/dL before scoring.
pub fn to_mgdl(values: &[f64], unit: GlucoseUnit) -> Vec<f64> {
    ScoreEngine::to_mgdl(values, unit)
}

/// Stateless-per-request engine with a stable instance identity.
///
/// The instance id ties every snapshot produced by one engine back to the
/// process that computed it, the same way a service instance tags its output.
pub struct FeatureEngine {
    instance_id: String,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureEngine {
    /// Create an engine with a fresh instance id
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an engine with a caller-chosen instance id
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Build a dashboard snapshot over the trailing [`SNAPSHOT_SPAN`] rows.
    ///
    /// The sensitivity score is computed from the trailing glucose series
    /// against the trailing bolus series; `latest` is absent when no rows
    /// aligned.
    pub fn snapshot(&self, rows: &[UnifiedRow]) -> DashboardSnapshot {
        let tail_start = rows.len().saturating_sub(SNAPSHOT_SPAN);
        let tail = &rows[tail_start..];

        let glucose_series: Vec<f64> = tail.iter().map(|r| r.glucose_mgdl).collect();
        let bolus_series: Vec<f64> = tail.iter().map(|r| r.bolus_units).collect();
        let sensitivity = ScoreEngine::sensitivity_score(&glucose_series, &bolus_series);

        DashboardSnapshot {
            producer: SnapshotProducer {
                name: PRODUCER_NAME.to_string(),
                version: GLYKOS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            latest: rows.last().cloned(),
            sensitivity,
            series: SnapshotSeries {
                timestamps: tail.iter().map(|r| r.timestamp.clone()).collect(),
                glucose_mgdl: glucose_series,
                steps: tail.iter().map(|r| r.steps).collect(),
                heart_rate: tail.iter().map(|r| r.heart_rate).collect(),
                bolus_units: bolus_series,
                carbs_g: tail.iter().map(|r| r.carbs_g).collect(),
            },
        }
    }

    /// Align a batch and snapshot it in one step.
    pub fn snapshot_batch(&self, batch: &RecordBatch, unit: GlucoseUnit) -> DashboardSnapshot {
        let rows = Aligner::align(batch, unit);
        self.snapshot(&rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GlucoseRecord, InsulinRecord, RawTimestamp};

    fn make_batch(rows: usize) -> RecordBatch {
        let glucose = (0..rows)
            .map(|i| GlucoseRecord {
                timestamp: Some(RawTimestamp::Iso(format!(
                    "2024-01-01T{:02}:{:02}:00Z",
                    i / 12,
                    (i % 12) * 5
                ))),
                glucose: Some(100.0 + (i % 7) as f64),
            })
            .collect();
        let insulin = (0..rows)
            .map(|i| InsulinRecord {
                timestamp: Some(RawTimestamp::Iso(format!(
                    "2024-01-01T{:02}:{:02}:30Z",
                    i / 12,
                    (i % 12) * 5
                ))),
                bolus_units: Some(0.5),
                basal_units: Some(0.2),
                carbs_g: Some(12.0),
            })
            .collect();
        RecordBatch {
            glucose,
            activity: vec![],
            insulin,
        }
    }

    #[test]
    fn test_end_to_end_rows_and_sequences() {
        let batch = make_batch(10);
        let rows = align_records(&batch, GlucoseUnit::MgDl);
        assert_eq!(rows.len(), 10);
        // Insulin joined via the shared minute bucket
        assert!(rows.iter().all(|r| r.bolus_units == 0.5));

        let sequences = derive_sequences(&rows, 6).unwrap();
        assert_eq!(sequences.len(), 5);
    }

    #[test]
    fn test_snapshot_covers_trailing_span_only() {
        let batch = make_batch(30);
        let engine = FeatureEngine::with_instance_id("test-engine".to_string());
        let snapshot = engine.snapshot_batch(&batch, GlucoseUnit::MgDl);

        assert_eq!(snapshot.series.timestamps.len(), SNAPSHOT_SPAN);
        assert_eq!(snapshot.series.glucose_mgdl.len(), SNAPSHOT_SPAN);
        assert_eq!(snapshot.producer.name, PRODUCER_NAME);
        assert_eq!(snapshot.producer.instance_id, "test-engine");

        let rows = align_records(&batch, GlucoseUnit::MgDl);
        assert_eq!(
            snapshot.latest.as_ref().unwrap().timestamp,
            rows.last().unwrap().timestamp
        );
        // Snapshot series end at the newest row
        assert_eq!(
            snapshot.series.timestamps.last().unwrap(),
            &rows.last().unwrap().timestamp
        );
    }

    #[test]
    fn test_snapshot_of_empty_rows() {
        let engine = FeatureEngine::new();
        let snapshot = engine.snapshot(&[]);

        assert!(snapshot.latest.is_none());
        assert!(snapshot.series.timestamps.is_empty());
        // Score still computed from the defined empty-series fallbacks
        assert_eq!(snapshot.sensitivity.components.insulin_units_total, 0.0);
    }

    #[test]
    fn test_snapshot_smaller_than_span_uses_all_rows() {
        let batch = make_batch(5);
        let engine = FeatureEngine::new();
        let snapshot = engine.snapshot_batch(&batch, GlucoseUnit::MgDl);
        assert_eq!(snapshot.series.timestamps.len(), 5);
    }
}

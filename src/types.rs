//! Core types for the Glykos pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: unified rows, sequence windows, score results, and the shared
//! numeric constants that keep the Aligner and the Score Engine consistent.

use serde::{Deserialize, Serialize};

/// Fixed clinical conversion constant between mmol/L and mg/dL for glucose.
///
/// Shared by the Aligner and the Score Engine so the two stages can never
/// disagree about unit conversion.
pub const MGDL_PER_MMOL: f64 = 18.0;

/// Alignment granularity: records within the same UTC minute join.
pub const SECS_PER_MINUTE: i64 = 60;

/// Glucose standard deviation (mg/dL) at which variability is fully penalized.
pub const GV_SATURATION_MGDL: f64 = 50.0;

/// Daily insulin total (units) at which insulin usage is fully penalized.
pub const IU_SATURATION_UNITS: f64 = 50.0;

/// Width of the linear mean-glucose scoring band (mg/dL).
pub const MEAN_TERM_SPAN_MGDL: f64 = 180.0;

/// Mean glucose (mg/dL) at which the mean term peaks.
pub const MEAN_TERM_TARGET_MGDL: f64 = 100.0;

/// Smallest accepted sequence window.
pub const MIN_WINDOW: usize = 3;

/// Largest accepted sequence window.
pub const MAX_WINDOW: usize = 24;

/// Default sequence window when the caller does not specify one.
pub const DEFAULT_WINDOW: usize = 6;

/// Glucose unit reported by the record source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GlucoseUnit {
    #[default]
    #[serde(rename = "mg/dL")]
    MgDl,
    #[serde(rename = "mmol/L")]
    MmolL,
}

impl GlucoseUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlucoseUnit::MgDl => "mg/dL",
            GlucoseUnit::MmolL => "mmol/L",
        }
    }
}

/// One synchronized observation: a glucose reading joined with whatever
/// activity and insulin records landed in the same UTC minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRow {
    /// Canonical ISO-8601 UTC timestamp of the driving glucose record.
    /// Lexical order of these strings equals chronological order.
    pub timestamp: String,
    /// Glucose in mg/dL (converted from mmol/L at ingestion when needed)
    pub glucose_mgdl: f64,
    /// Step count from the matching activity record (0 when unmatched)
    pub steps: u32,
    /// Heart rate from the matching activity record (0 when unmatched)
    pub heart_rate: u32,
    /// Bolus insulin from the matching insulin record (0.0 when unmatched)
    pub bolus_units: f64,
    /// Basal insulin from the matching insulin record (0.0 when unmatched)
    pub basal_units: f64,
    /// Carbohydrates from the matching insulin record (0.0 when unmatched)
    pub carbs_g: f64,
    /// Cyclical time-of-day encoding, sine component
    pub circadian_sin: f64,
    /// Cyclical time-of-day encoding, cosine component
    pub circadian_cos: f64,
    /// Glucose divided by carbs (divisor falls back to 1.0 when carbs are 0)
    pub glucose_carb_ratio: f64,
}

/// A sliding window of the last `window` rows for each tracked feature.
///
/// Every feature vector has exactly the configured window length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceWindow {
    /// Timestamp of the last row covered by this window
    pub end_timestamp: String,
    pub glucose_mgdl: Vec<f64>,
    pub carbs_g: Vec<f64>,
    pub bolus_units: Vec<f64>,
    pub glucose_carb_ratio: Vec<f64>,
    pub circadian_sin: Vec<f64>,
    pub circadian_cos: Vec<f64>,
}

/// Named intermediate terms behind an Insulin Sensitivity Score.
///
/// Rounded to fixed precision so score breakdowns are reproducible across
/// runs and usable in test assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    /// Mean glucose of the input series (mg/dL, 1 decimal)
    pub mean_glucose: f64,
    /// Population standard deviation of the glucose series (mg/dL, 1 decimal)
    pub glucose_variability_std: f64,
    /// Sum of the insulin series (units, 2 decimals)
    pub insulin_units_total: f64,
    /// Mean-glucose term before weighting (0-1, 3 decimals)
    pub mean_term: f64,
    /// Normalized glucose variability (0-1, 3 decimals)
    pub gv_norm: f64,
    /// Normalized insulin usage (0-1, 3 decimals)
    pub iu_norm: f64,
}

/// Insulin Sensitivity Score with its component breakdown.
///
/// The score is a bounded [0,100] heuristic for trend tracking, not a
/// diagnostic value. Components exist for observability of the heuristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub components: ScoreComponents,
}

/// Rule used to derive the Insulin Sensitivity Factor from total daily dose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IsfMethod {
    /// 1800 / TDD, expressed in mg/dL per unit
    #[default]
    #[serde(rename = "1800_rule")]
    Rule1800,
    /// 100 / TDD, expressed in mmol/L per unit
    #[serde(rename = "100_rule")]
    Rule100,
}

impl IsfMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsfMethod::Rule1800 => "1800_rule",
            IsfMethod::Rule100 => "100_rule",
        }
    }
}

/// Insulin Sensitivity Factor: expected glucose drop per unit of insulin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityFactor {
    pub value: f64,
    /// Unit label matching the rule ("mg/dL per U" or "mmol/L per U")
    pub unit: String,
}

/// Producer metadata stamped onto dashboard snapshots for provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Trailing per-feature series backing a dashboard snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSeries {
    pub timestamps: Vec<String>,
    pub glucose_mgdl: Vec<f64>,
    pub steps: Vec<u32>,
    pub heart_rate: Vec<u32>,
    pub bolus_units: Vec<f64>,
    pub carbs_g: Vec<f64>,
}

/// One-shot dashboard view: the latest row, a sensitivity score over the
/// trailing rows, and the trailing series themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub producer: SnapshotProducer,
    pub computed_at_utc: String,
    /// Most recent unified row, if any rows aligned
    pub latest: Option<UnifiedRow>,
    pub sensitivity: ScoreResult,
    pub series: SnapshotSeries,
}

/// Round to `decimals` decimal places.
pub(crate) fn round_dp(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

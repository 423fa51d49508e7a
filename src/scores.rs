//! Heuristic sensitivity scoring
//!
//! This module computes the two clinical heuristics:
//! - Insulin Sensitivity Score: population-style statistics over a glucose
//!   and an insulin series, bounded [0,100], higher = more sensitive
//! - Insulin Sensitivity Factor: a ratio rule over total daily dose
//!
//! Both are approximate, tunable heuristics for trend tracking. Neither is
//! diagnostic.

use crate::error::EngineError;
use crate::types::{
    round_dp, GlucoseUnit, IsfMethod, ScoreComponents, ScoreResult, SensitivityFactor,
    GV_SATURATION_MGDL, IU_SATURATION_UNITS, MEAN_TERM_SPAN_MGDL, MEAN_TERM_TARGET_MGDL,
    MGDL_PER_MMOL,
};

/// Numerator of the 1800 rule (mg/dL per unit)
const RULE_1800_NUMERATOR: f64 = 1800.0;

/// Numerator of the 100 rule (mmol/L per unit)
const RULE_100_NUMERATOR: f64 = 100.0;

/// Score engine for the sensitivity heuristics
pub struct ScoreEngine;

impl ScoreEngine {
    /// Insulin Sensitivity Score over a glucose series (mg/dL) and an
    /// insulin-units series.
    ///
    /// The two series are aggregated independently and need not match in
    /// length. Empty inputs use defined fallbacks (mean over a length-1
    /// divisor, zero variability, zero insulin) rather than failing.
    pub fn sensitivity_score(glucose_mgdl: &[f64], insulin_units: &[f64]) -> ScoreResult {
        // Empty series divide by 1, not 0
        let n = glucose_mgdl.len().max(1) as f64;
        let mean_g = glucose_mgdl.iter().sum::<f64>() / n;
        let gv = if glucose_mgdl.len() > 1 {
            population_std_dev(glucose_mgdl, mean_g)
        } else {
            0.0
        };
        let iu = insulin_units.iter().sum::<f64>();

        let gv_norm = (gv / GV_SATURATION_MGDL).min(1.0);
        let iu_norm = (iu / IU_SATURATION_UNITS).min(1.0);
        let mean_term = ((MEAN_TERM_SPAN_MGDL - (mean_g - MEAN_TERM_TARGET_MGDL).abs())
            / MEAN_TERM_SPAN_MGDL)
            .clamp(0.0, 1.0);

        let raw = 0.5 * mean_term + 0.25 * (1.0 - gv_norm) + 0.25 * (1.0 - iu_norm);

        ScoreResult {
            score: round_dp(100.0 * raw, 1),
            components: ScoreComponents {
                mean_glucose: round_dp(mean_g, 1),
                glucose_variability_std: round_dp(gv, 1),
                insulin_units_total: round_dp(iu, 2),
                mean_term: round_dp(mean_term, 3),
                gv_norm: round_dp(gv_norm, 3),
                iu_norm: round_dp(iu_norm, 3),
            },
        }
    }

    /// Insulin Sensitivity Factor from total daily dose.
    ///
    /// Rejects non-positive doses with `InvalidDose`; never silently returns
    /// infinity or a negative factor.
    pub fn sensitivity_factor(
        method: IsfMethod,
        total_daily_dose: f64,
    ) -> Result<SensitivityFactor, EngineError> {
        if total_daily_dose <= 0.0 {
            return Err(EngineError::InvalidDose(total_daily_dose));
        }

        let factor = match method {
            IsfMethod::Rule1800 => SensitivityFactor {
                value: round_dp(RULE_1800_NUMERATOR / total_daily_dose, 2),
                unit: "mg/dL per U".to_string(),
            },
            IsfMethod::Rule100 => SensitivityFactor {
                value: round_dp(RULE_100_NUMERATOR / total_daily_dose, 3),
                unit: "mmol/L per U".to_string(),
            },
        };
        Ok(factor)
    }

    /// Convert a glucose series to mg/dL.
    ///
    /// Uses the same conversion constant as the Aligner so pre-scoring
    /// normalization can never drift from row alignment.
    pub fn to_mgdl(values: &[f64], unit: GlucoseUnit) -> Vec<f64> {
        match unit {
            GlucoseUnit::MmolL => values.iter().map(|v| v * MGDL_PER_MMOL).collect(),
            GlucoseUnit::MgDl => values.to_vec(),
        }
    }
}

/// Population standard deviation (divisor N, not N-1)
fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

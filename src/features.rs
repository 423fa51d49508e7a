//! Feature derivation
//!
//! This module derives per-row features from canonical instants and joined
//! values:
//! - circadian phase as a smooth cyclical time-of-day encoding
//! - glucose-to-carbohydrate ratio

use crate::types::round_dp;
use chrono::{DateTime, Timelike, Utc};
use std::f64::consts::PI;

/// Feature deriver for augmenting unified rows
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// Circadian phase of an instant as a (sin, cos) pair.
    ///
    /// `hour_of_day = hour + minute/60`, mapped onto the unit circle over 24
    /// hours. The encoding is continuous across the day boundary, unlike a
    /// raw hour-of-day feature.
    pub fn circadian(dt: &DateTime<Utc>) -> (f64, f64) {
        let hour_of_day = dt.hour() as f64 + dt.minute() as f64 / 60.0;
        let angle = 2.0 * PI * hour_of_day / 24.0;
        (angle.sin(), angle.cos())
    }

    /// Glucose divided by carbohydrates, rounded to 3 decimals.
    ///
    /// When carbs are zero the divisor falls back to 1.0. That is a defined
    /// fallback, not a missing value: rows without carbs still carry a ratio.
    pub fn glucose_carb_ratio(glucose_mgdl: f64, carbs_g: f64) -> f64 {
        let divisor = if carbs_g > 0.0 { carbs_g } else { 1.0 };
        round_dp(glucose_mgdl / divisor, 3)
    }
}

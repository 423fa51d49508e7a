//! Sequence derivation
//!
//! This module slides a fixed-size window over the sorted unified rows and
//! materializes one feature sequence per window position. Sequences feed
//! downstream consumers that want the trailing context of each observation.

use crate::error::EngineError;
use crate::types::{SequenceWindow, UnifiedRow, MAX_WINDOW, MIN_WINDOW};

/// Sequencer for producing overlapping feature windows
pub struct Sequencer;

impl Sequencer {
    /// Slide a window of `window` rows over the input.
    ///
    /// Produces `max(0, rows - window + 1)` windows; fewer rows than the
    /// window size is an empty result, not an error. A window outside
    /// [`MIN_WINDOW`]..=[`MAX_WINDOW`] is rejected loudly.
    pub fn derive(rows: &[UnifiedRow], window: usize) -> Result<Vec<SequenceWindow>, EngineError> {
        if !(MIN_WINDOW..=MAX_WINDOW).contains(&window) {
            return Err(EngineError::WindowOutOfRange {
                window,
                min: MIN_WINDOW,
                max: MAX_WINDOW,
            });
        }

        if rows.len() < window {
            return Ok(Vec::new());
        }

        let mut sequences = Vec::with_capacity(rows.len() - window + 1);
        for end in (window - 1)..rows.len() {
            let slice = &rows[end + 1 - window..=end];
            sequences.push(SequenceWindow {
                end_timestamp: rows[end].timestamp.clone(),
                glucose_mgdl: slice.iter().map(|r| r.glucose_mgdl).collect(),
                carbs_g: slice.iter().map(|r| r.carbs_g).collect(),
                bolus_units: slice.iter().map(|r| r.bolus_units).collect(),
                glucose_carb_ratio: slice.iter().map(|r| r.glucose_carb_ratio).collect(),
                circadian_sin: slice.iter().map(|r| r.circadian_sin).collect(),
                circadian_cos: slice.iter().map(|r| r.circadian_cos).collect(),
            });
        }

        Ok(sequences)
    }
}

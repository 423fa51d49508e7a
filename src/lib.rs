//! Glykos - compute engine for diabetes time-series features
//!
//! Glykos merges three independently-timestamped health record streams
//! (CGM glucose, activity, insulin dosing) into synchronized feature rows
//! through a deterministic pipeline: timestamp normalization → minute-bucket
//! alignment → feature derivation → {windowed sequences, sensitivity scores}.
//!
//! ## Modules
//!
//! - **Core Pipeline**: align records, derive sequences, compute scores
//! - **Record Source**: the seam toward the document store holding the streams
//! - **Server** (feature `server`): thin HTTP surface over the pipeline

pub mod aligner;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod scores;
pub mod sequencer;
pub mod source;
pub mod types;

#[cfg(feature = "server")]
pub mod server;

pub use error::EngineError;
pub use pipeline::{
    align_records, compute_sensitivity_factor, compute_sensitivity_score, derive_sequences,
    to_mgdl, FeatureEngine,
};
pub use schema::{RawTimestamp, RecordBatch};
pub use source::{RecentQuery, RecordSource, StaticRecordSource};
pub use types::{
    DashboardSnapshot, GlucoseUnit, IsfMethod, ScoreResult, SensitivityFactor, SequenceWindow,
    UnifiedRow,
};

/// Glykos version embedded in snapshot provenance
pub const GLYKOS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for snapshot provenance
pub const PRODUCER_NAME: &str = "glykos";

//! Record source seam
//!
//! The store that holds the three streams is an external collaborator; the
//! core only sees already-materialized batches. This module defines the
//! query shape, the fetch trait the HTTP glue programs against, and an
//! in-memory implementation used by the CLI, the demo server, and tests.

use crate::error::EngineError;
use crate::schema::RecordBatch;
use crate::types::GlucoseUnit;
use serde::{Deserialize, Serialize};

pub const MIN_LOOKBACK_MINUTES: u32 = 5;
pub const MAX_LOOKBACK_MINUTES: u32 = 1440;
pub const DEFAULT_LOOKBACK_MINUTES: u32 = 240;

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 1000;
pub const DEFAULT_LIMIT: usize = 500;

/// Bounded fetch parameters for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentQuery {
    /// Subject to filter by, when the store keys records per subject
    #[serde(default)]
    pub user_id: Option<String>,
    /// How far back the fetch reaches, in minutes
    #[serde(default = "default_lookback")]
    pub lookback_minutes: u32,
    /// Per-stream record cap
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Unit of the glucose values in the store
    #[serde(default)]
    pub unit: GlucoseUnit,
}

fn default_lookback() -> u32 {
    DEFAULT_LOOKBACK_MINUTES
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for RecentQuery {
    fn default() -> Self {
        Self {
            user_id: None,
            lookback_minutes: DEFAULT_LOOKBACK_MINUTES,
            limit: DEFAULT_LIMIT,
            unit: GlucoseUnit::default(),
        }
    }
}

impl RecentQuery {
    /// Reject out-of-range fetch parameters loudly.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_LOOKBACK_MINUTES..=MAX_LOOKBACK_MINUTES).contains(&self.lookback_minutes) {
            return Err(EngineError::InvalidQuery(format!(
                "lookback_minutes {} outside {}..={}",
                self.lookback_minutes, MIN_LOOKBACK_MINUTES, MAX_LOOKBACK_MINUTES
            )));
        }
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&self.limit) {
            return Err(EngineError::InvalidQuery(format!(
                "limit {} outside {}..={}",
                self.limit, MIN_LIMIT, MAX_LIMIT
            )));
        }
        Ok(())
    }
}

/// Supplier of the three record streams for a bounded time window.
///
/// Implementations return records ordered newest-first; the core re-sorts,
/// so only completeness matters. Records missing required fields are
/// tolerated downstream, not rejected here.
pub trait RecordSource: Send + Sync {
    fn fetch_recent(&self, query: &RecentQuery) -> Result<RecordBatch, EngineError>;
}

/// In-memory record source backed by a fixed batch.
///
/// Applies the per-stream `limit`; subject and lookback filtering belong to
/// a real store-backed implementation.
pub struct StaticRecordSource {
    batch: RecordBatch,
}

impl StaticRecordSource {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Load the batch from a JSON document with the three stream arrays.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(Self::new(RecordBatch::from_json(json)?))
    }
}

impl RecordSource for StaticRecordSource {
    fn fetch_recent(&self, query: &RecentQuery) -> Result<RecordBatch, EngineError> {
        query.validate()?;

        let mut batch = self.batch.clone();
        batch.glucose.truncate(query.limit);
        batch.activity.truncate(query.limit);
        batch.insulin.truncate(query.limit);
        Ok(batch)
    }
}

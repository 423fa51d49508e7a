//! Raw record schema
//!
//! Defines the wire shape of the three record streams as fetched from the
//! document store, including the heterogeneous timestamp representation.

pub mod records;

pub use records::{
    ActivityRecord, GlucoseRecord, InsulinRecord, RawTimestamp, RecordBatch,
};

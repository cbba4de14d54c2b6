//! Data models for the intake pipeline

mod batch;

pub use batch::{
    BatchSummary, ExistingEntry, ExternalPayload, FailedEntry, ItemOutcome, RecordSnapshot,
    ResolvedEntry, RunState,
};

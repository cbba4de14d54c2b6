//! Batch run data model
//!
//! One user-submitted batch drives each identifier through a two-phase lookup
//! and lands it in exactly one terminal bucket. These types are the data
//! contracts between the batch processor, the progress reporter, and the API.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record snapshot returned by the primary existence check
///
/// Every field is optional: a sparse record is normal and renders as
/// "unknown"/"N/A" in the presentation layer, never as an error here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Current status label of the case/order
    pub status: Option<String>,
    /// Date the case was received
    pub received_date: Option<NaiveDate>,
    /// Rush/priority flag
    pub rush: Option<bool>,
}

/// Payload fetched from the external order source by the secondary lookup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExternalPayload {
    /// Order number as known to the external source
    pub order_number: Option<String>,
    /// Customer name on the order
    pub customer_name: Option<String>,
    /// Status label at the external source
    pub status: Option<String>,
    /// Date the order was placed
    pub order_date: Option<String>,
}

/// Terminal (or transient) classification of one identifier
///
/// Per identifier the state machine is
/// `Pending -> {Existing | Resolved | Failed}`; no transition leaves a
/// terminal state, and no identifier remains `Pending` after its batch
/// completes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    /// Lookup sequence in flight (non-terminal)
    Pending,
    /// Identifier already known to the system of record
    Existing { record: RecordSnapshot },
    /// Not previously known; enriched from the external source
    Resolved { payload: ExternalPayload },
    /// Lookup sequence failed; batch continues with the next identifier
    Failed { reason: String, code: Option<String> },
}

impl ItemOutcome {
    /// True for `Existing`, `Resolved`, and `Failed`
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemOutcome::Pending)
    }
}

/// Existing-bucket entry: identifier plus its record snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ExistingEntry {
    pub identifier: String,
    pub record: RecordSnapshot,
}

/// Resolved-bucket entry: identifier plus the fetched payload
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedEntry {
    pub identifier: String,
    pub payload: ExternalPayload,
}

/// Failed-bucket entry: identifier plus the human-readable reason and the
/// machine error code when the external source provided one
#[derive(Debug, Clone, Serialize)]
pub struct FailedEntry {
    pub identifier: String,
    pub reason: String,
    pub code: Option<String>,
}

/// Lifecycle state of the live batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// No batch submitted since startup or last reset
    Idle,
    /// A driving task is working through the identifier list
    Running,
    /// Every identifier reached a terminal bucket
    Completed,
}

/// Final counts for one completed batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total: usize,
    pub existing: usize,
    pub resolved: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

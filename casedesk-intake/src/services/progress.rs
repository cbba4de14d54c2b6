//! Progress reporter for the live batch run
//!
//! Accumulates per-identifier outcomes into the four named buckets and keeps
//! the derived counters the dashboard polls. Only one batch run is live at a
//! time; every mutation is keyed by the run id that produced it, so events
//! from a superseded run are dropped instead of bleeding into the next one.
//!
//! The driving task is the single writer; API handlers read snapshots. Bucket
//! and counter updates happen under one lock acquisition, so a reader never
//! observes a completed item missing from its bucket.

use crate::models::{
    ExistingEntry, ExternalPayload, FailedEntry, ItemOutcome, RecordSnapshot, ResolvedEntry,
    RunState,
};
use serde::Serialize;
use uuid::Uuid;

/// Live state of the current batch run
#[derive(Debug)]
pub struct ProgressReporter {
    /// Run all mutations are keyed to; None when idle
    run_id: Option<Uuid>,
    state: RunState,
    total_submitted: usize,
    /// Identifiers not yet completed, seeded at run start and drained as
    /// items reach a terminal bucket
    pending: Vec<String>,
    /// Terminal buckets, insertion order = completion order
    existing: Vec<ExistingEntry>,
    resolved: Vec<ResolvedEntry>,
    failed: Vec<FailedEntry>,
}

/// Read-only snapshot of the reporter for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub batch_id: Option<Uuid>,
    pub state: RunState,
    pub total_submitted: usize,
    pub completed: usize,
    pub pending_count: usize,
    pub pending: Vec<String>,
    pub existing: Vec<ExistingEntry>,
    pub resolved: Vec<ResolvedEntry>,
    pub failed: Vec<FailedEntry>,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            run_id: None,
            state: RunState::Idle,
            total_submitted: 0,
            pending: Vec::new(),
            existing: Vec::new(),
            resolved: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Begin a new run, replacing whatever state the previous run left behind
    ///
    /// Every submitted identifier enters the pending bucket up front, so
    /// `completed + pending == total_submitted` holds from the first snapshot
    /// onward, not just at item boundaries.
    pub fn begin_run(&mut self, run_id: Uuid, identifiers: &[String]) {
        self.clear();
        self.run_id = Some(run_id);
        self.state = RunState::Running;
        self.total_submitted = identifiers.len();
        self.pending = identifiers.to_vec();
    }

    /// True while a driving task owns the reporter
    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Run id the reporter is currently keyed to
    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    /// Move an identifier from pending to the existing bucket
    ///
    /// Returns false (and changes nothing) if `run_id` is not the live run.
    pub fn record_existing(
        &mut self,
        run_id: Uuid,
        identifier: &str,
        record: RecordSnapshot,
    ) -> bool {
        if !self.accepts(run_id) {
            return false;
        }
        self.take_pending(identifier);
        self.existing.push(ExistingEntry {
            identifier: identifier.to_string(),
            record,
        });
        true
    }

    /// Move an identifier from pending to the resolved bucket
    pub fn record_resolved(
        &mut self,
        run_id: Uuid,
        identifier: &str,
        payload: ExternalPayload,
    ) -> bool {
        if !self.accepts(run_id) {
            return false;
        }
        self.take_pending(identifier);
        self.resolved.push(ResolvedEntry {
            identifier: identifier.to_string(),
            payload,
        });
        true
    }

    /// Move an identifier from pending to the failed bucket
    pub fn record_failed(
        &mut self,
        run_id: Uuid,
        identifier: &str,
        reason: String,
        code: Option<String>,
    ) -> bool {
        if !self.accepts(run_id) {
            return false;
        }
        self.take_pending(identifier);
        self.failed.push(FailedEntry {
            identifier: identifier.to_string(),
            reason,
            code,
        });
        true
    }

    /// Record one identifier's classification, keyed to the live run
    ///
    /// Identifiers are already pending from `begin_run`, so `Pending` only
    /// confirms the run is still live; terminal variants move the identifier
    /// out of pending into their bucket.
    pub fn record_outcome(&mut self, run_id: Uuid, identifier: &str, outcome: ItemOutcome) -> bool {
        match outcome {
            ItemOutcome::Pending => self.accepts(run_id),
            ItemOutcome::Existing { record } => self.record_existing(run_id, identifier, record),
            ItemOutcome::Resolved { payload } => self.record_resolved(run_id, identifier, payload),
            ItemOutcome::Failed { reason, code } => {
                self.record_failed(run_id, identifier, reason, code)
            }
        }
    }

    /// Mark the live run completed
    pub fn complete_run(&mut self, run_id: Uuid) -> bool {
        if !self.accepts(run_id) {
            return false;
        }
        self.state = RunState::Completed;
        true
    }

    /// Clear all buckets and counters and detach from the live run
    ///
    /// Idempotent and callable mid-run: subsequent mutations keyed to the old
    /// run id are dropped.
    pub fn reset(&mut self) {
        self.clear();
        self.run_id = None;
        self.state = RunState::Idle;
    }

    pub fn total_submitted(&self) -> usize {
        self.total_submitted
    }

    /// Completed item count (sum of the terminal bucket sizes)
    pub fn completed(&self) -> usize {
        self.existing.len() + self.resolved.len() + self.failed.len()
    }

    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    pub fn existing(&self) -> &[ExistingEntry] {
        &self.existing
    }

    pub fn resolved(&self) -> &[ResolvedEntry] {
        &self.resolved
    }

    pub fn failed(&self) -> &[FailedEntry] {
        &self.failed
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Snapshot for the status endpoint
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            batch_id: self.run_id,
            state: self.state,
            total_submitted: self.total_submitted,
            completed: self.completed(),
            pending_count: self.pending.len(),
            pending: self.pending.clone(),
            existing: self.existing.clone(),
            resolved: self.resolved.clone(),
            failed: self.failed.clone(),
        }
    }

    fn accepts(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id) && self.state == RunState::Running
    }

    /// Remove the first pending occurrence of this identifier, if present
    ///
    /// Duplicates are legal input; identifiers complete in input order, so
    /// the first occurrence is always the one that just finished.
    fn take_pending(&mut self, identifier: &str) {
        if let Some(pos) = self.pending.iter().position(|p| p == identifier) {
            self.pending.remove(pos);
        }
    }

    fn clear(&mut self) {
        self.total_submitted = 0;
        self.pending.clear();
        self.existing.clear();
        self.resolved.clear();
        self.failed.clear();
    }
}

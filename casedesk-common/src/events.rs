//! Event types for the CaseDesk event system
//!
//! Provides the shared `IntakeEvent` definitions and the `EventBus` used to
//! broadcast intake progress to SSE clients.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// CaseDesk intake events
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
/// All progress milestones for one batch carry the `batch_id` that produced
/// them so consumers can discard events from a superseded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntakeEvent {
    /// Batch accepted and the driving task started
    BatchStarted {
        batch_id: Uuid,
        total_identifiers: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Identifier entered the pending bucket (primary lookup about to run)
    ItemPending {
        batch_id: Uuid,
        index: usize,
        identifier: String,
    },

    /// Identifier already known to the system of record
    ItemExisting {
        batch_id: Uuid,
        index: usize,
        identifier: String,
        /// Status label from the record snapshot, when present
        status: Option<String>,
    },

    /// Identifier enriched from the external source
    ItemResolved {
        batch_id: Uuid,
        index: usize,
        identifier: String,
    },

    /// Identifier could not be resolved; batch continues
    ItemFailed {
        batch_id: Uuid,
        index: usize,
        identifier: String,
        reason: String,
        code: Option<String>,
    },

    /// All identifiers reached a terminal bucket
    BatchCompleted {
        batch_id: Uuid,
        existing: usize,
        resolved: usize,
        failed: usize,
        total: usize,
        duration_ms: u64,
    },

    /// Progress reporter was reset (buckets and counters cleared)
    BatchReset {
        /// Run that was live when the reset arrived, if any
        batch_id: Option<Uuid>,
    },
}

impl IntakeEvent {
    /// Event type name for SSE `event:` tagging
    pub fn event_type(&self) -> &str {
        match self {
            IntakeEvent::BatchStarted { .. } => "BatchStarted",
            IntakeEvent::ItemPending { .. } => "ItemPending",
            IntakeEvent::ItemExisting { .. } => "ItemExisting",
            IntakeEvent::ItemResolved { .. } => "ItemResolved",
            IntakeEvent::ItemFailed { .. } => "ItemFailed",
            IntakeEvent::BatchCompleted { .. } => "BatchCompleted",
            IntakeEvent::BatchReset { .. } => "BatchReset",
        }
    }

    /// Batch this event belongs to (None only for a reset with no live run)
    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            IntakeEvent::BatchStarted { batch_id, .. }
            | IntakeEvent::ItemPending { batch_id, .. }
            | IntakeEvent::ItemExisting { batch_id, .. }
            | IntakeEvent::ItemResolved { batch_id, .. }
            | IntakeEvent::ItemFailed { batch_id, .. }
            | IntakeEvent::BatchCompleted { batch_id, .. } => Some(*batch_id),
            IntakeEvent::BatchReset { batch_id } => *batch_id,
        }
    }
}

/// Broadcast bus for intake events
///
/// Thin wrapper over `tokio::sync::broadcast` shared by the batch processor
/// (producer) and SSE handlers (consumers).
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use casedesk_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: IntakeEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<IntakeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Progress milestones are non-critical: the reporter holds the
    /// authoritative state and status polling covers clients that missed them.
    pub fn emit_lossy(&self, event: IntakeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

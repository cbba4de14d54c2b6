//! Batch processor: the per-identifier intake state machine
//!
//! Drives one batch through the two-phase lookup sequence, strictly one
//! identifier in flight at a time (the downstream sources are rate limited
//! and stateful, so throughput is traded for simplicity). Each identifier's
//! workflow is independent and failure-isolated: one bad identifier cannot
//! poison the batch.
//!
//! Every identifier starts in the pending bucket when the run begins. Per
//! identifier an `ItemPending` milestone is broadcast, then the primary
//! existence check decides between `Existing` (no secondary call) and the
//! secondary enrichment lookup, which ends in `Resolved` or `Failed`.
//! Transport errors from either phase are normalized into `Failed` and
//! processing continues.

use crate::models::{BatchSummary, ItemOutcome};
use crate::services::lookup_client::LookupClient;
use crate::services::progress::ProgressReporter;
use casedesk_common::events::{EventBus, IntakeEvent};
use casedesk_common::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Sequential batch driver
///
/// Cloned into the background task spawned per accepted batch; at most one
/// such task is live at a time (enforced at the API layer).
#[derive(Clone)]
pub struct BatchProcessor {
    /// Remote lookup seam (HTTP in production, scripted in tests)
    client: Arc<dyn LookupClient>,
    /// Live batch run state; this task is the single writer
    reporter: Arc<RwLock<ProgressReporter>>,
    /// Broadcast channel for SSE progress events
    event_bus: EventBus,
    /// Batch-level diagnostic: most recent lookup transport error
    last_error: Arc<RwLock<Option<String>>>,
}

impl BatchProcessor {
    pub fn new(
        client: Arc<dyn LookupClient>,
        reporter: Arc<RwLock<ProgressReporter>>,
        event_bus: EventBus,
        last_error: Arc<RwLock<Option<String>>>,
    ) -> Self {
        Self {
            client,
            reporter,
            event_bus,
            last_error,
        }
    }

    /// Run one batch to completion
    ///
    /// The caller must have claimed the reporter with `begin_run(batch_id, …)`
    /// before invoking this; every mutation here is keyed to `batch_id`, so a
    /// mid-run `reset()` detaches the reporter and this task winds down after
    /// its current lookup instead of attributing further outcomes.
    ///
    /// # Errors
    /// Returns `Error::InvalidInput` for an empty identifier list, before any
    /// remote call is issued. Per-identifier lookup failures never propagate.
    pub async fn run_batch(
        &self,
        batch_id: Uuid,
        identifiers: Vec<String>,
    ) -> Result<BatchSummary> {
        if identifiers.is_empty() {
            return Err(Error::InvalidInput(
                "no valid identifiers in input".to_string(),
            ));
        }

        let started = Instant::now();
        let total = identifiers.len();

        tracing::info!(
            batch_id = %batch_id,
            total = total,
            "Starting intake batch"
        );

        self.event_bus.emit_lossy(IntakeEvent::BatchStarted {
            batch_id,
            total_identifiers: total,
            timestamp: chrono::Utc::now(),
        });

        let mut existing = 0usize;
        let mut resolved = 0usize;
        let mut failed = 0usize;
        let mut superseded = false;

        for (index, identifier) in identifiers.iter().enumerate() {
            if !self
                .commit(batch_id, index, identifier, ItemOutcome::Pending)
                .await
            {
                superseded = true;
                break;
            }

            let outcome = self.classify(batch_id, identifier).await;
            let tally = match &outcome {
                ItemOutcome::Existing { .. } => &mut existing,
                ItemOutcome::Resolved { .. } => &mut resolved,
                // classify only produces terminal outcomes
                ItemOutcome::Failed { .. } | ItemOutcome::Pending => &mut failed,
            };

            if !self.commit(batch_id, index, identifier, outcome).await {
                superseded = true;
                break;
            }
            *tally += 1;
        }

        let duration_ms = started.elapsed().as_millis() as u64;

        if superseded {
            tracing::info!(
                batch_id = %batch_id,
                completed = existing + resolved + failed,
                total = total,
                "Batch superseded by reset, stopping without further lookups"
            );
        } else {
            self.reporter.write().await.complete_run(batch_id);

            tracing::info!(
                batch_id = %batch_id,
                existing = existing,
                resolved = resolved,
                failed = failed,
                duration_ms = duration_ms,
                "Intake batch completed"
            );

            self.event_bus.emit_lossy(IntakeEvent::BatchCompleted {
                batch_id,
                existing,
                resolved,
                failed,
                total,
                duration_ms,
            });
        }

        Ok(BatchSummary {
            batch_id,
            total,
            existing,
            resolved,
            failed,
            duration_ms,
        })
    }

    /// Drive one identifier through both lookup phases to a terminal outcome
    ///
    /// Never touches the reporter; transport errors from either phase are
    /// normalized into `Failed` and recorded as the batch-level diagnostic.
    async fn classify(&self, batch_id: Uuid, identifier: &str) -> ItemOutcome {
        // Phase 1: existence check against the system of record
        let check = match self.client.check_existing(identifier).await {
            Ok(check) => check,
            Err(e) => {
                let reason = format!("primary lookup error: {}", e);
                tracing::warn!(
                    batch_id = %batch_id,
                    identifier = %identifier,
                    error = %e,
                    "Primary lookup failed, classifying as failed and continuing"
                );
                *self.last_error.write().await = Some(reason.clone());
                return ItemOutcome::Failed { reason, code: None };
            }
        };

        if check.exists {
            // Sparse or missing record bodies are normal; presentation renders
            // missing fields as unknown
            return ItemOutcome::Existing {
                record: check.record.unwrap_or_default(),
            };
        }

        // Phase 2: enrichment from the external source
        match self.client.fetch_external(identifier).await {
            Ok(fetch) if fetch.success => ItemOutcome::Resolved {
                payload: fetch.payload.unwrap_or_default(),
            },
            Ok(fetch) => {
                // Non-exceptional failure: the source answered, the order is
                // simply not resolvable
                ItemOutcome::Failed {
                    reason: fetch
                        .message
                        .unwrap_or_else(|| "external lookup failed".to_string()),
                    code: fetch.code,
                }
            }
            Err(e) => {
                let reason = format!("secondary lookup error: {}", e);
                tracing::warn!(
                    batch_id = %batch_id,
                    identifier = %identifier,
                    error = %e,
                    "Secondary lookup failed, classifying as failed and continuing"
                );
                *self.last_error.write().await = Some(reason.clone());
                ItemOutcome::Failed { reason, code: None }
            }
        }
    }

    /// Attribute an outcome to the reporter and broadcast the matching event
    ///
    /// Returns false without emitting when the run has been superseded.
    async fn commit(
        &self,
        batch_id: Uuid,
        index: usize,
        identifier: &str,
        outcome: ItemOutcome,
    ) -> bool {
        let event = match &outcome {
            ItemOutcome::Pending => IntakeEvent::ItemPending {
                batch_id,
                index,
                identifier: identifier.to_string(),
            },
            ItemOutcome::Existing { record } => IntakeEvent::ItemExisting {
                batch_id,
                index,
                identifier: identifier.to_string(),
                status: record.status.clone(),
            },
            ItemOutcome::Resolved { .. } => IntakeEvent::ItemResolved {
                batch_id,
                index,
                identifier: identifier.to_string(),
            },
            ItemOutcome::Failed { reason, code } => IntakeEvent::ItemFailed {
                batch_id,
                index,
                identifier: identifier.to_string(),
                reason: reason.clone(),
                code: code.clone(),
            },
        };

        if !self
            .reporter
            .write()
            .await
            .record_outcome(batch_id, identifier, outcome)
        {
            return false;
        }

        self.event_bus.emit_lossy(event);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExternalPayload, RecordSnapshot, RunState};
    use crate::services::lookup_client::{CheckResult, FetchResult, LookupError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Scripted lookup client keyed by identifier value
    ///
    /// - "1001" exists in the system of record
    /// - "2002" is unknown locally, resolvable externally
    /// - "3003" is unknown locally, external source answers success=false
    /// - "4004" is unknown locally, external lookup errors at transport level
    /// - "5005" errors at transport level on the primary check
    struct ScriptedClient {
        fetch_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new() -> Self {
            Self {
                fetch_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl LookupClient for ScriptedClient {
        async fn check_existing(&self, identifier: &str) -> std::result::Result<CheckResult, LookupError> {
            match identifier {
                "1001" => Ok(CheckResult {
                    exists: true,
                    record: Some(RecordSnapshot {
                        status: Some("received".to_string()),
                        received_date: None,
                        rush: Some(true),
                    }),
                }),
                "5005" => Err(LookupError::Network("connection refused".to_string())),
                _ => Ok(CheckResult {
                    exists: false,
                    record: None,
                }),
            }
        }

        async fn fetch_external(&self, identifier: &str) -> std::result::Result<FetchResult, LookupError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            match identifier {
                "2002" => Ok(FetchResult {
                    success: true,
                    payload: Some(ExternalPayload {
                        order_number: Some("2002".to_string()),
                        customer_name: Some("Acme Corp".to_string()),
                        status: Some("shipped".to_string()),
                        order_date: None,
                    }),
                    message: None,
                    code: None,
                }),
                "3003" => Ok(FetchResult {
                    success: false,
                    payload: None,
                    message: Some("order not found".to_string()),
                    code: Some("NOT_FOUND".to_string()),
                }),
                "4004" => Err(LookupError::Network("timeout".to_string())),
                other => panic!("unexpected external lookup for {}", other),
            }
        }
    }

    struct Harness {
        processor: BatchProcessor,
        reporter: Arc<RwLock<ProgressReporter>>,
        event_bus: EventBus,
        last_error: Arc<RwLock<Option<String>>>,
        client: Arc<ScriptedClient>,
    }

    fn harness() -> Harness {
        let client = Arc::new(ScriptedClient::new());
        let reporter = Arc::new(RwLock::new(ProgressReporter::new()));
        let event_bus = EventBus::new(100);
        let last_error = Arc::new(RwLock::new(None));
        let processor = BatchProcessor::new(
            client.clone(),
            reporter.clone(),
            event_bus.clone(),
            last_error.clone(),
        );
        Harness {
            processor,
            reporter,
            event_bus,
            last_error,
            client,
        }
    }

    async fn begin(h: &Harness, batch_id: Uuid, identifiers: &[&str]) -> Vec<String> {
        let ids: Vec<String> = identifiers.iter().map(|s| s.to_string()).collect();
        h.reporter.write().await.begin_run(batch_id, &ids);
        ids
    }

    #[tokio::test]
    async fn test_empty_batch_is_validation_error() {
        let h = harness();
        let result = h.processor.run_batch(Uuid::new_v4(), Vec::new()).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        // No buckets populated, no remote calls issued
        let reporter = h.reporter.read().await;
        assert_eq!(reporter.completed(), 0);
        assert_eq!(h.client.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_known_identifier_lands_in_existing() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["1001"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();
        assert_eq!(summary.existing, 1);

        let reporter = h.reporter.read().await;
        assert_eq!(reporter.existing().len(), 1);
        let entry = &reporter.existing()[0];
        assert_eq!(entry.identifier, "1001");
        assert_eq!(entry.record.status.as_deref(), Some("received"));
        assert_eq!(entry.record.rush, Some(true));

        // Secondary lookup never invoked for a known identifier
        assert_eq!(h.client.fetch_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_new_identifier_resolved_externally() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["2002"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();
        assert_eq!(summary.resolved, 1);

        let reporter = h.reporter.read().await;
        let entry = &reporter.resolved()[0];
        assert_eq!(entry.identifier, "2002");
        assert_eq!(entry.payload.customer_name.as_deref(), Some("Acme Corp"));
    }

    #[tokio::test]
    async fn test_unresolvable_identifier_fails_with_reason_and_code() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["3003", "1001"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();

        let reporter = h.reporter.read().await;
        let entry = &reporter.failed()[0];
        assert_eq!(entry.identifier, "3003");
        assert_eq!(entry.reason, "order not found");
        assert_eq!(entry.code.as_deref(), Some("NOT_FOUND"));

        // Failure of one identifier does not stop the rest of the batch
        assert_eq!(summary.existing, 1);
        assert_eq!(reporter.completed(), 2);
        assert_eq!(reporter.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_mixed_batch_counts() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["1001", "2002", "3003"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();

        assert_eq!(summary.existing, 1);
        assert_eq!(summary.resolved, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total, 3);

        let reporter = h.reporter.read().await;
        assert_eq!(reporter.completed(), 3);
        assert!(reporter.pending().is_empty());
    }

    #[tokio::test]
    async fn test_primary_transport_error_isolated() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["5005", "1001"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();

        let reporter = h.reporter.read().await;
        let entry = &reporter.failed()[0];
        assert_eq!(entry.identifier, "5005");
        assert!(entry.reason.starts_with("primary lookup error:"));
        assert!(entry.code.is_none());

        // Batch-level diagnostic retained, batch continued
        let last_error = h.last_error.read().await.clone().unwrap();
        assert!(last_error.contains("connection refused"));
        assert_eq!(summary.existing, 1);
    }

    #[tokio::test]
    async fn test_secondary_transport_error_isolated() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["4004", "2002"]).await;

        let summary = h.processor.run_batch(batch_id, ids).await.unwrap();

        let reporter = h.reporter.read().await;
        assert!(reporter.failed()[0]
            .reason
            .starts_with("secondary lookup error:"));
        assert!(h.last_error.read().await.is_some());
        assert_eq!(summary.resolved, 1);
    }

    #[tokio::test]
    async fn test_most_recent_error_wins() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let ids = begin(&h, batch_id, &["5005", "4004"]).await;

        h.processor.run_batch(batch_id, ids).await.unwrap();

        let last_error = h.last_error.read().await.clone().unwrap();
        assert!(last_error.starts_with("secondary lookup error:"));
        assert!(last_error.contains("timeout"));
    }

    #[tokio::test]
    async fn test_event_order_pending_precedes_terminal() {
        let h = harness();
        let batch_id = Uuid::new_v4();
        let mut rx = h.event_bus.subscribe();
        let ids = begin(&h, batch_id, &["1001", "2002", "3003"]).await;

        h.processor.run_batch(batch_id, ids).await.unwrap();

        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let done = matches!(event, IntakeEvent::BatchCompleted { .. });
            events.push(event.event_type().to_string());
            if done {
                break;
            }
        }

        assert_eq!(
            events,
            vec![
                "BatchStarted",
                "ItemPending",
                "ItemExisting",
                "ItemPending",
                "ItemResolved",
                "ItemPending",
                "ItemFailed",
                "BatchCompleted",
            ]
        );
    }

    /// Lookup client that parks on the first primary check until released,
    /// letting the test reset the reporter while a lookup is in flight
    struct GatedClient {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl LookupClient for GatedClient {
        async fn check_existing(&self, _identifier: &str) -> std::result::Result<CheckResult, LookupError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(CheckResult {
                exists: true,
                record: None,
            })
        }

        async fn fetch_external(&self, _identifier: &str) -> std::result::Result<FetchResult, LookupError> {
            unreachable!("gated client never reaches the secondary lookup");
        }
    }

    #[tokio::test]
    async fn test_reset_mid_run_drops_stale_outcomes() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let client = Arc::new(GatedClient {
            entered: entered.clone(),
            release: release.clone(),
        });

        let reporter = Arc::new(RwLock::new(ProgressReporter::new()));
        let event_bus = EventBus::new(100);
        let last_error = Arc::new(RwLock::new(None));
        let processor = BatchProcessor::new(
            client,
            reporter.clone(),
            event_bus,
            last_error,
        );

        let batch_id = Uuid::new_v4();
        let ids = vec!["1001".to_string(), "1002".to_string()];
        reporter.write().await.begin_run(batch_id, &ids);

        let task = tokio::spawn({
            let processor = processor.clone();
            async move { processor.run_batch(batch_id, ids).await }
        });

        // Wait until the first primary check is in flight, then clear
        entered.notified().await;
        reporter.write().await.reset();
        release.notify_one();

        let summary = task.await.unwrap().unwrap();

        // The in-flight outcome was dropped and no further lookups ran
        assert_eq!(summary.existing, 0);
        let reporter = reporter.read().await;
        assert_eq!(reporter.completed(), 0);
        assert!(reporter.pending().is_empty());
        assert_eq!(reporter.state(), RunState::Idle);
    }
}

//! Intake batch API handlers
//!
//! POST /intake/start, POST /intake/preview, GET /intake/status,
//! POST /intake/reset

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::RunState;
use crate::parser;
use crate::services::{BatchProcessor, ProgressSnapshot};
use crate::AppState;
use casedesk_common::events::IntakeEvent;

/// POST /intake/start request
#[derive(Debug, Deserialize)]
pub struct StartIntakeRequest {
    /// Raw pasted/scanned input, one identifier per line
    pub raw_text: String,
}

/// POST /intake/start response
#[derive(Debug, Serialize)]
pub struct StartIntakeResponse {
    pub batch_id: Uuid,
    pub total_submitted: usize,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

/// POST /intake/preview request
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub raw_text: String,
}

/// POST /intake/preview response
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    /// Count of lines that parse as valid identifiers
    pub valid_identifiers: usize,
}

/// GET /intake/status response
#[derive(Debug, Serialize)]
pub struct IntakeStatusResponse {
    #[serde(flatten)]
    pub progress: ProgressSnapshot,
    /// Most recent lookup transport error, for the diagnostic banner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// POST /intake/reset response
#[derive(Debug, Serialize)]
pub struct ResetIntakeResponse {
    pub state: RunState,
}

/// POST /intake/start
///
/// Parse the raw input and start the batch driving task. Returns 400 when the
/// input contains no valid identifiers and 409 while another batch is live
/// (the dashboard disables submit while loading; the server mirrors that).
pub async fn start_intake(
    State(state): State<AppState>,
    Json(request): Json<StartIntakeRequest>,
) -> ApiResult<Json<StartIntakeResponse>> {
    let identifiers = parser::parse(&request.raw_text);
    if identifiers.is_empty() {
        return Err(ApiError::BadRequest(
            "no valid identifiers in input".to_string(),
        ));
    }

    let batch_id = Uuid::new_v4();

    // Claim the reporter under one write lock so two concurrent submits
    // cannot both begin a run
    {
        let mut reporter = state.reporter.write().await;
        if reporter.is_running() {
            return Err(ApiError::Conflict(
                "intake batch already running".to_string(),
            ));
        }
        reporter.begin_run(batch_id, &identifiers);
    }

    *state.last_error.write().await = None;

    let response = StartIntakeResponse {
        batch_id,
        total_submitted: identifiers.len(),
        submitted_at: chrono::Utc::now(),
    };

    tracing::info!(
        batch_id = %batch_id,
        total = identifiers.len(),
        "Intake batch accepted"
    );

    // Background task drives the batch; handlers only read snapshots
    let processor = BatchProcessor::new(
        state.lookup_client.clone(),
        state.reporter.clone(),
        state.event_bus.clone(),
        state.last_error.clone(),
    );
    tokio::spawn(async move {
        if let Err(e) = processor.run_batch(batch_id, identifiers).await {
            tracing::error!(
                batch_id = %batch_id,
                error = %e,
                "Intake batch task failed"
            );
        }
    });

    Ok(Json(response))
}

/// POST /intake/preview
///
/// Count of valid identifiers in the live-edited input buffer; drives the
/// dashboard's running counter without starting a batch.
pub async fn preview_intake(
    Json(request): Json<PreviewRequest>,
) -> Json<PreviewResponse> {
    Json(PreviewResponse {
        valid_identifiers: parser::parse(&request.raw_text).len(),
    })
}

/// GET /intake/status
///
/// Snapshot of buckets, counters, run state, and the last-error diagnostic.
pub async fn get_intake_status(State(state): State<AppState>) -> Json<IntakeStatusResponse> {
    let progress = state.reporter.read().await.snapshot();
    let last_error = state.last_error.read().await.clone();

    Json(IntakeStatusResponse {
        progress,
        last_error,
    })
}

/// POST /intake/reset
///
/// Clear buckets, counters, and the diagnostic banner. Idempotent; callable
/// mid-run, in which case the running task's remaining events are dropped.
pub async fn reset_intake(State(state): State<AppState>) -> Json<ResetIntakeResponse> {
    let superseded = {
        let mut reporter = state.reporter.write().await;
        let live = reporter.run_id();
        reporter.reset();
        live
    };
    *state.last_error.write().await = None;

    tracing::info!(
        superseded_batch = ?superseded,
        "Intake progress reset"
    );

    state.event_bus.emit_lossy(IntakeEvent::BatchReset {
        batch_id: superseded,
    });

    Json(ResetIntakeResponse {
        state: RunState::Idle,
    })
}

/// Build intake routes
pub fn intake_routes() -> Router<AppState> {
    Router::new()
        .route("/intake/start", post(start_intake))
        .route("/intake/preview", post(preview_intake))
        .route("/intake/status", get(get_intake_status))
        .route("/intake/reset", post(reset_intake))
}

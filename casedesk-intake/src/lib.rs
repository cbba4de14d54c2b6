//! casedesk-intake library interface
//!
//! Exposes the intake pipeline (parser, batch processor, progress reporter)
//! and the HTTP surface for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod parser;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::{routing::get, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::services::{LookupClient, ProgressReporter};
use casedesk_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Remote lookup seam (HTTP in production, scripted in tests)
    pub lookup_client: Arc<dyn LookupClient>,
    /// Live batch run: buckets and counters, single-writer
    pub reporter: Arc<RwLock<ProgressReporter>>,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Most recent lookup transport error, for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(lookup_client: Arc<dyn LookupClient>, event_bus: EventBus) -> Self {
        Self {
            lookup_client,
            reporter: Arc::new(RwLock::new(ProgressReporter::new())),
            event_bus,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::intake_routes())
        .route("/intake/events", get(api::intake_event_stream))
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

//! casedesk-intake - Case Intake Service
//!
//! Backend for the CaseDesk "cases received" and "status update" pages:
//! accepts pasted/scanned identifier batches, drives each identifier through
//! the two-phase remote lookup, and streams live progress over SSE.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use casedesk_common::config::TomlConfig;
use casedesk_common::events::EventBus;
use casedesk_intake::services::HttpLookupClient;
use casedesk_intake::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting casedesk-intake (Case Intake) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration (ENV -> TOML -> defaults)
    let config = TomlConfig::load()?;
    info!("Records API: {}", config.records_base_url);
    info!("External order source: {}", config.external_base_url);

    // HTTP lookup client for both remote sources
    let lookup_client = HttpLookupClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create lookup client: {}", e))?;

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100); // 100 event capacity
    info!("Event bus initialized");

    // Create application state
    let state = AppState::new(Arc::new(lookup_client), event_bus);

    // Build router
    let app = casedesk_intake::build_router(state);

    // Start server
    let addr = format!("127.0.0.1:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! HTTP API handlers for casedesk-intake
//!
//! REST endpoints for batch submit/status/reset plus SSE progress streaming.

pub mod health;
pub mod intake;
pub mod sse;

pub use health::health_routes;
pub use intake::intake_routes;
pub use sse::intake_event_stream;

//! Lookup client trait seam
//!
//! The batch processor depends on this trait rather than on concrete HTTP
//! plumbing so per-identifier failures stay isolated and tests can script
//! lookup behavior. The production implementation is
//! [`super::http_lookup::HttpLookupClient`].

use crate::models::{ExternalPayload, RecordSnapshot};
use serde::Deserialize;
use thiserror::Error;

/// Lookup transport/protocol errors
///
/// Any of these is caught at the per-identifier boundary and normalized into
/// a `Failed` outcome; none aborts the batch.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Network-level failure (connect, timeout, TLS)
    #[error("network error: {0}")]
    Network(String),

    /// Lookup service answered with an unexpected HTTP status
    #[error("lookup service returned status {0}: {1}")]
    Api(u16, String),

    /// Response body could not be decoded
    #[error("parse error: {0}")]
    Parse(String),
}

/// Result of the primary existence check
#[derive(Debug, Clone, Deserialize)]
pub struct CheckResult {
    /// Whether the identifier is already known to the system of record
    pub exists: bool,
    /// Record snapshot when it exists (may be sparse)
    #[serde(default)]
    pub record: Option<RecordSnapshot>,
}

/// Result of the secondary enrichment lookup
///
/// `success: false` is a normal, expected outcome (e.g. the external source
/// has no such order), not an error path.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    #[serde(default)]
    pub payload: Option<ExternalPayload>,
    /// Human-readable failure reason when `success` is false
    #[serde(default)]
    pub message: Option<String>,
    /// Machine error code when the source provides one (e.g. "NOT_FOUND")
    #[serde(default)]
    pub code: Option<String>,
}

/// Remote lookup operations the intake pipeline depends on
///
/// Object-safe so `AppState` can hold `Arc<dyn LookupClient>` and tests can
/// swap in scripted implementations.
#[async_trait::async_trait]
pub trait LookupClient: Send + Sync {
    /// Primary lookup: is this identifier already in the system of record?
    async fn check_existing(&self, identifier: &str) -> Result<CheckResult, LookupError>;

    /// Secondary lookup: fetch authoritative data from the external source
    ///
    /// Only invoked when the primary check reports the identifier unknown.
    async fn fetch_external(&self, identifier: &str) -> Result<FetchResult, LookupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_deserializes_without_record() {
        let result: CheckResult = serde_json::from_str(r#"{"exists": false}"#).unwrap();
        assert!(!result.exists);
        assert!(result.record.is_none());
    }

    #[test]
    fn test_fetch_result_failure_body() {
        let result: FetchResult = serde_json::from_str(
            r#"{"success": false, "message": "order not found", "code": "NOT_FOUND"}"#,
        )
        .unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some("order not found"));
        assert_eq!(result.code.as_deref(), Some("NOT_FOUND"));
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_fetch_result_success_body() {
        let result: FetchResult = serde_json::from_str(
            r#"{"success": true, "payload": {"order_number": "2002", "customer_name": "Acme"}}"#,
        )
        .unwrap();
        assert!(result.success);
        let payload = result.payload.unwrap();
        assert_eq!(payload.order_number.as_deref(), Some("2002"));
        assert_eq!(payload.customer_name.as_deref(), Some("Acme"));
    }
}

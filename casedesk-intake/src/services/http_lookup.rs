//! HTTP implementation of the lookup client
//!
//! Primary endpoint: `GET {records_base_url}/records/{id}` against the system
//! of record (404 means not known, which is a normal answer).
//! Secondary endpoint: `GET {external_base_url}/orders/{id}` against the
//! external order source, rate limited because the downstream enforces a
//! per-client request budget.

use crate::models::RecordSnapshot;
use crate::services::lookup_client::{CheckResult, FetchResult, LookupClient, LookupError};
use casedesk_common::config::TomlConfig;
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;

/// HTTP lookup client for the intake pipeline
pub struct HttpLookupClient {
    /// HTTP client with configured timeouts
    client: Client,
    /// Base URL for the system-of-record API
    records_base_url: String,
    /// Base URL for the external order source
    external_base_url: String,
    /// Rate limiter for the external source (requests per second)
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpLookupClient {
    /// Create a new HTTP lookup client from service configuration
    pub fn new(config: &TomlConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(casedesk_common::config::get_user_agent())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        // A zero configured rate would make the limiter unconstructible; clamp to 1
        let per_second =
            NonZeroU32::new(config.external_rate_limit_per_sec).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(per_second));

        Ok(Self {
            client,
            records_base_url: config.records_base_url.trim_end_matches('/').to_string(),
            external_base_url: config.external_base_url.trim_end_matches('/').to_string(),
            rate_limiter,
        })
    }
}

#[async_trait::async_trait]
impl LookupClient for HttpLookupClient {
    async fn check_existing(&self, identifier: &str) -> Result<CheckResult, LookupError> {
        let url = format!("{}/records/{}", self.records_base_url, identifier);

        tracing::debug!(identifier = %identifier, url = %url, "Primary existence check");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();

        // 404 is the normal "not known" answer, not an error
        if status == StatusCode::NOT_FOUND {
            return Ok(CheckResult {
                exists: false,
                record: None,
            });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), error_text));
        }

        let record: RecordSnapshot = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        tracing::debug!(
            identifier = %identifier,
            status = record.status.as_deref().unwrap_or("unknown"),
            "Record found in system of record"
        );

        Ok(CheckResult {
            exists: true,
            record: Some(record),
        })
    }

    async fn fetch_external(&self, identifier: &str) -> Result<FetchResult, LookupError> {
        // The external source enforces a request budget; wait our turn
        self.rate_limiter.until_ready().await;

        let url = format!("{}/orders/{}", self.external_base_url, identifier);

        tracing::debug!(identifier = %identifier, url = %url, "Secondary enrichment lookup");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LookupError::Api(status.as_u16(), error_text));
        }

        // A failure result (success: false) arrives as a well-formed 200 body
        let result: FetchResult = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        tracing::debug!(
            identifier = %identifier,
            success = result.success,
            code = result.code.as_deref().unwrap_or(""),
            "External lookup answered"
        );

        Ok(result)
    }
}

//! Intake services
//!
//! - `lookup_client` - trait seam for the two remote lookups
//! - `http_lookup` - production HTTP implementation
//! - `progress` - live batch run state (buckets + counters)
//! - `batch_processor` - sequential per-identifier state machine

pub mod batch_processor;
pub mod http_lookup;
pub mod lookup_client;
pub mod progress;

pub use batch_processor::BatchProcessor;
pub use http_lookup::HttpLookupClient;
pub use lookup_client::{CheckResult, FetchResult, LookupClient, LookupError};
pub use progress::{ProgressReporter, ProgressSnapshot};

//! Shared types for CaseDesk services
//!
//! Provides the common error type, the event bus used for SSE broadcasting,
//! and TOML/environment configuration loading.

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};

//! Configuration loading for CaseDesk services
//!
//! Resolution priority for every key: environment variable, then TOML config
//! file, then compiled default. A warning is logged when a key is defined in
//! more than one source.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default HTTP listen port for the intake service
pub const DEFAULT_LISTEN_PORT: u16 = 5727;

/// Service configuration from TOML file with environment overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// HTTP listen port for the intake service
    pub listen_port: u16,
    /// Base URL of the system-of-record API (primary existence check)
    pub records_base_url: String,
    /// Base URL of the external order source (secondary enrichment lookup)
    pub external_base_url: String,
    /// Rate limit for the external source, requests per second
    pub external_rate_limit_per_sec: u32,
    /// Total per-request timeout for remote lookups, seconds
    pub request_timeout_secs: u64,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_LISTEN_PORT,
            records_base_url: "http://127.0.0.1:5740/api".to_string(),
            external_base_url: "http://127.0.0.1:5741/api".to_string(),
            external_rate_limit_per_sec: 2,
            request_timeout_secs: 30,
        }
    }
}

impl TomlConfig {
    /// Load configuration with ENV → TOML → default priority
    ///
    /// The TOML file location itself can be overridden with `CASEDESK_CONFIG`.
    /// A missing config file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        let mut config = match std::fs::read_to_string(&path) {
            Ok(content) => {
                let config: TomlConfig = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            Err(_) => {
                info!(path = %path.display(), "No configuration file found, using defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `CASEDESK_*` environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("CASEDESK_LISTEN_PORT") {
            match value.parse::<u16>() {
                Ok(port) => {
                    if port != self.listen_port {
                        warn!("listen_port overridden by CASEDESK_LISTEN_PORT");
                    }
                    self.listen_port = port;
                }
                Err(_) => warn!(value = %value, "Ignoring invalid CASEDESK_LISTEN_PORT"),
            }
        }

        if let Ok(value) = std::env::var("CASEDESK_RECORDS_BASE_URL") {
            self.records_base_url = value;
        }

        if let Ok(value) = std::env::var("CASEDESK_EXTERNAL_BASE_URL") {
            self.external_base_url = value;
        }

        if let Ok(value) = std::env::var("CASEDESK_EXTERNAL_RATE_LIMIT") {
            match value.parse::<u32>() {
                Ok(limit) if limit > 0 => self.external_rate_limit_per_sec = limit,
                _ => warn!(value = %value, "Ignoring invalid CASEDESK_EXTERNAL_RATE_LIMIT"),
            }
        }

        if let Ok(value) = std::env::var("CASEDESK_REQUEST_TIMEOUT_SECS") {
            match value.parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => warn!(value = %value, "Ignoring invalid CASEDESK_REQUEST_TIMEOUT_SECS"),
            }
        }
    }
}

/// Configuration file path: `CASEDESK_CONFIG` override, else
/// `~/.config/casedesk/intake.toml`
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("CASEDESK_CONFIG") {
        return PathBuf::from(path);
    }

    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("casedesk")
        .join("intake.toml")
}

/// Standard User-Agent string for CaseDesk HTTP clients
pub fn get_user_agent() -> String {
    format!("CaseDesk/{}", env!("CARGO_PKG_VERSION"))
}

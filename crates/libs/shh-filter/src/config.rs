use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ShhError;

pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:8545";
pub const DEFAULT_RPC_PATH: &str = "/";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const MIN_POLL_INTERVAL_MS: u64 = 10;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
#[non_exhaustive]
pub struct ShhConfig {
    /// `host:port` of the node's HTTP JSON-RPC listener.
    pub endpoint: String,
    pub rpc_path: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for ShhConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            rpc_path: DEFAULT_RPC_PATH.to_owned(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl ShhConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ShhError> {
        let config: Self = toml::from_str(raw).map_err(|err| ShhError::config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ShhError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|err| ShhError::config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
        self.endpoint = endpoint.into();
    }

    pub fn set_poll_interval_ms(&mut self, poll_interval_ms: u64) {
        self.poll_interval_ms = poll_interval_ms;
    }

    pub fn set_request_timeout_ms(&mut self, request_timeout_ms: u64) {
        self.request_timeout_ms = request_timeout_ms;
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ShhError> {
        if self.endpoint.trim().is_empty() {
            return Err(ShhError::config("endpoint must not be empty"));
        }
        if !self.rpc_path.starts_with('/') {
            return Err(ShhError::config("rpc_path must start with '/'"));
        }
        if self.poll_interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(ShhError::config(format!(
                "poll_interval_ms must be at least {MIN_POLL_INTERVAL_MS}"
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ShhError::config("request_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

//! Environment-driven configuration for the composition root (§6
//! "Environment", §4.12). No config-loading crate — `std::env::var`
//! only, matching the teacher's own minimalism (config arrives through
//! constructor arguments, not a framework).

use std::env;
use thiserror::Error;

/// Failure reading required configuration from the environment.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}

/// Runtime configuration assembled from environment variables and
/// documented defaults. Construct with [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// The LM provider API key (`LM_API_KEY`, required).
    pub lm_api_key: String,
    /// The LM provider's base URL, if overridden (`LM_BASE_URL`, optional).
    pub lm_base_url: Option<String>,
    /// Directory tool manifests are loaded from (`TOOL_MANIFEST_DIR`,
    /// defaults to `./tools`).
    pub tool_manifest_dir: String,
    /// Default per-tool concurrency ceiling (`TOOL_CONCURRENCY`, defaults to 4).
    pub tool_concurrency: usize,
    /// Canvas reliable-message ack timeout, in milliseconds
    /// (`CANVAS_ACK_TIMEOUT_MS`, defaults to 5000).
    pub canvas_ack_timeout_ms: u64,
    /// Canvas inbound dedup ring size (`CANVAS_DEDUP_CAPACITY`, defaults to 1000).
    pub canvas_dedup_capacity: usize,
}

impl Config {
    /// Read configuration from the process environment. Fails only if
    /// `LM_API_KEY` is unset; every other knob falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lm_api_key = env::var("LM_API_KEY").map_err(|_| ConfigError::MissingVar("LM_API_KEY"))?;
        let lm_base_url = env::var("LM_BASE_URL").ok();
        let tool_manifest_dir = env::var("TOOL_MANIFEST_DIR").unwrap_or_else(|_| "./tools".to_string());
        let tool_concurrency = env_or("TOOL_CONCURRENCY", 4);
        let canvas_ack_timeout_ms = env_or("CANVAS_ACK_TIMEOUT_MS", 5000);
        let canvas_dedup_capacity = env_or("CANVAS_DEDUP_CAPACITY", 1000);

        Ok(Self {
            lm_api_key,
            lm_base_url,
            tool_manifest_dir,
            tool_concurrency,
            canvas_ack_timeout_ms,
            canvas_dedup_capacity,
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_unparsable_values() {
        assert_eq!(env_or::<u64>("CONDUCTOR_TEST_DOES_NOT_EXIST", 42), 42);
    }
}

//! Client configuration parsed from environment variables.

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client configuration: where the API lives and how long to wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API origin, no trailing slash.
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl ClientConfig {
    /// Build a config for the given API origin with default timeouts.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load from `BASEBUILD_API_BASE_URL` (required) and
    /// `BASEBUILD_API_TIMEOUT_SECS` (optional, seconds).
    /// Returns `None` when the base URL is not set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("BASEBUILD_API_BASE_URL").ok()?;
        let mut config = Self::new(&base_url);
        config.request_timeout_secs = env_parse_u64("BASEBUILD_API_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS);
        Some(config)
    }
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

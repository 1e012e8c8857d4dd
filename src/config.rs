//! Session subsystem configuration.
//!
//! Read once at startup from the environment (a `.env` file is honored if
//! present). Everything has a sensible default so tests and local
//! development need no setup.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::warn;

/// Application name used for cache directory paths
const APP_NAME: &str = "opstrack";

/// Rotation-record store file name
const ROTATION_STORE_FILE: &str = "rotation.json";

/// Default idle window before automatic logout, in minutes.
const DEFAULT_IDLE_MINUTES: u64 = 10;

/// Default HTTP request timeout in seconds.
/// Auth calls must fail fast rather than hang a login or logout screen.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin, e.g. `https://ops.example.com`. `/api/...` paths are
    /// appended to this.
    pub base_url: String,
    pub request_timeout: Duration,
    pub idle_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            idle_window: Duration::from_secs(DEFAULT_IDLE_MINUTES * 60),
        }
    }
}

impl Config {
    /// Build from `OPSTRACK_API_URL`, `OPSTRACK_REQUEST_TIMEOUT_SECS` and
    /// `OPSTRACK_IDLE_MINUTES`, falling back to defaults. Unparseable
    /// values are logged and ignored rather than failing startup.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Ok(url) = std::env::var("OPSTRACK_API_URL") {
            if !url.is_empty() {
                config.base_url = url;
            }
        }
        if let Some(secs) = parse_env_u64("OPSTRACK_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(minutes) = parse_env_u64("OPSTRACK_IDLE_MINUTES") {
            config.idle_window = Duration::from_secs(minutes * 60);
        }

        config
    }

    /// Location of the browser-scoped rotation-record store.
    pub fn rotation_store_path(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(ROTATION_STORE_FILE))
    }
}

fn parse_env_u64(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.idle_window, Duration::from_secs(600));
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.base_url.starts_with("http"));
    }
}

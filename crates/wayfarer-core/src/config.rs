//! Client configuration management.
//!
//! Configuration is stored at `~/.config/wayfarer/config.json` and can be
//! overridden from the environment (`WAYFARER_API_BASE_URL`,
//! `WAYFARER_TOKEN_BACKEND`). Missing files fall back to defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::SessionKind;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "wayfarer";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_BASE_URL: &str = "WAYFARER_API_BASE_URL";
const ENV_TOKEN_BACKEND: &str = "WAYFARER_TOKEN_BACKEND";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";

/// Where credential pairs are persisted between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenBackend {
    #[default]
    File,
    Keyring,
}

impl std::str::FromStr for TokenBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(TokenBackend::File),
            "keyring" => Ok(TokenBackend::Keyring),
            other => Err(anyhow::anyhow!("Unknown token backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub admin_login_route: String,
    pub customer_login_route: String,
    /// Tokens expiring within this window are refreshed before use.
    pub refresh_buffer_secs: i64,
    pub max_retries: u32,
    /// Fixed pause between a successful reactive refresh and the retry.
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub token_backend: TokenBackend,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            admin_login_route: "/ttm/login".to_string(),
            customer_login_route: "/customer/login".to_string(),
            refresh_buffer_secs: 5 * 60,
            max_retries: 3,
            retry_delay_ms: 1000,
            request_timeout_secs: 30,
            token_backend: TokenBackend::File,
        }
    }
}

impl Config {
    /// Load from disk, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_BASE_URL) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
        if let Ok(backend) = std::env::var(ENV_TOKEN_BACKEND) {
            match backend.parse() {
                Ok(b) => self.token_backend = b,
                Err(e) => warn!(error = %e, "Ignoring {}", ENV_TOKEN_BACKEND),
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Join an API path onto the base URL with exactly one separator.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
    }

    pub fn login_route(&self, kind: SessionKind) -> &str {
        match kind {
            SessionKind::Admin => &self.admin_login_route,
            SessionKind::Customer => &self.customer_login_route,
        }
    }

    pub fn refresh_buffer(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_buffer_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_policy() {
        let config = Config::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.refresh_buffer(), chrono::Duration::minutes(5));
        assert_eq!(config.token_backend, TokenBackend::File);
    }

    #[test]
    fn test_endpoint_joins_with_single_slash() {
        let config = Config {
            api_base_url: "https://example.test/api/".to_string(),
            ..Config::default()
        };
        assert_eq!(config.endpoint("packages/"), "https://example.test/api/packages/");
        assert_eq!(config.endpoint("/packages/"), "https://example.test/api/packages/");
        assert_eq!(config.endpoint("token/refresh/"), "https://example.test/api/token/refresh/");
    }

    #[test]
    fn test_login_route_per_session_kind() {
        let config = Config::default();
        assert_eq!(config.login_route(SessionKind::Admin), "/ttm/login");
        assert_eq!(config.login_route(SessionKind::Customer), "/customer/login");
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"max_retries": 1, "token_backend": "keyring"}"#)
            .expect("partial config should parse");
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.token_backend, TokenBackend::Keyring);
        assert_eq!(config.admin_login_route, "/ttm/login");
    }

    #[test]
    fn test_token_backend_from_str() {
        assert_eq!("File".parse::<TokenBackend>().unwrap(), TokenBackend::File);
        assert_eq!(" keyring ".parse::<TokenBackend>().unwrap(), TokenBackend::Keyring);
        assert!("redis".parse::<TokenBackend>().is_err());
    }
}

//! Configuration Management
//!
//! Connection and tuning settings for nbsync. Values come from the optional
//! config file, then CLI flags; the NetBox URL and token fall back to the
//! `NETBOX_ADDR` / `NETBOX_TOKEN` environment variables.

use crate::netbox::error::{NetboxError, RetryOn};
use crate::netbox::http::{RetryPolicy, TransportSettings, DEFAULT_MAX_CONCURRENCY};
use crate::netbox::pager::DEFAULT_PAGE_SIZE;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_NETBOX_ADDR: &str = "NETBOX_ADDR";
pub const ENV_NETBOX_TOKEN: &str = "NETBOX_TOKEN";

/// User configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// NetBox server URL, without the `/api` suffix
    pub netbox_url: Option<String>,
    /// NetBox API token
    pub netbox_token: Option<String>,
    pub timeout_secs: u64,
    /// Records per page for list calls
    pub page_size: usize,
    /// Ceiling on concurrent in-flight requests
    pub max_concurrency: usize,
    /// Total attempts per request, including the first
    pub retry_attempts: usize,
    pub retry_min_wait_ms: u64,
    pub retry_max_wait_ms: u64,
    /// Retry every 5xx status instead of only 500
    pub retry_all_5xx: bool,
    /// OpenAPI document to load instead of the embedded one
    pub openapi_spec: Option<PathBuf>,
    pub verify_tls: bool,
}

impl Default for Config {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            netbox_url: None,
            netbox_token: None,
            timeout_secs: 60,
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry_attempts: retry.attempts,
            retry_min_wait_ms: retry.min_wait.as_millis() as u64,
            retry_max_wait_ms: retry.max_wait.as_millis() as u64,
            retry_all_5xx: false,
            openapi_spec: None,
            verify_tls: false,
        }
    }
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nbsync").join("config.json"))
    }

    /// Load configuration from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply explicitly supplied connection values over whatever was loaded
    pub fn with_connection(mut self, url: Option<String>, token: Option<String>) -> Self {
        if url.is_some() {
            self.netbox_url = url;
        }
        if token.is_some() {
            self.netbox_token = token;
        }
        self
    }

    /// Get effective URL (explicit > NETBOX_ADDR)
    pub fn effective_url(&self) -> Result<String, NetboxError> {
        explicit_or_env(&self.netbox_url, ENV_NETBOX_ADDR)
    }

    /// Get effective token (explicit > NETBOX_TOKEN)
    pub fn effective_token(&self) -> Result<String, NetboxError> {
        explicit_or_env(&self.netbox_token, ENV_NETBOX_TOKEN)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            min_wait: Duration::from_millis(self.retry_min_wait_ms),
            max_wait: Duration::from_millis(self.retry_max_wait_ms),
            retry_on: if self.retry_all_5xx {
                RetryOn::ServerErrors
            } else {
                RetryOn::InternalServerError
            },
        }
    }

    /// Resolve everything the transport needs; fails naming the missing variable
    pub fn transport_settings(&self) -> Result<TransportSettings, NetboxError> {
        let url = self.effective_url()?;
        let token = self.effective_token()?;

        Ok(TransportSettings {
            api_url: format!("{}/api", url.trim_end_matches('/')),
            token,
            timeout: Duration::from_secs(self.timeout_secs),
            max_concurrency: self.max_concurrency,
            verify_tls: self.verify_tls,
            retry: self.retry_policy(),
        })
    }
}

fn explicit_or_env(explicit: &Option<String>, var: &'static str) -> Result<String, NetboxError> {
    explicit
        .clone()
        .filter(|v| !v.is_empty())
        .or_else(|| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .ok_or(NetboxError::MissingConfig(var))
}

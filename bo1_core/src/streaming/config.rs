//! Stream client configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::backoff::ReconnectPolicy;
use crate::config::{self, non_blank, parse_flag, parse_u64, DEFAULT_BASE_URL};
use crate::errors::CoreError;
use crate::urls::normalize_backend_base;

/// Configuration for a [`StreamClient`](super::StreamClient).
///
/// Fixed at construction; the client never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamClientConfig {
    /// Backend base URL (an `/api` or `/api/v1` suffix is tolerated).
    pub base_url: String,
    /// Sent as `Authorization: Bearer` when present.
    pub api_key: Option<String>,
    /// Reconnect after transport failures.
    pub auto_reconnect: bool,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout_ms: u64,
    /// Treat the stream as dead when no frame arrives for this long.
    pub idle_timeout_ms: Option<u64>,
    /// Close the client once a `complete` event has been dispatched.
    pub close_on_complete: bool,
    pub user_agent: String,
}

impl Default for StreamClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            auto_reconnect: true,
            reconnect: ReconnectPolicy::default(),
            connect_timeout_ms: 10_000,
            idle_timeout_ms: None,
            close_on_complete: true,
            user_agent: concat!("bo1-core/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl StreamClientConfig {
    /// Build a config from process environment variables.
    ///
    /// - `BO1_API_BASE_URL`
    /// - `BO1_API_KEY`
    /// - `BO1_SSE_AUTO_RECONNECT`
    /// - `BO1_SSE_RECONNECT_DELAY_MS`
    /// - `BO1_SSE_MAX_RECONNECT_ATTEMPTS` (`0` or `none` = unlimited)
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, starting from defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_blank(&lookup, "BO1_API_BASE_URL") {
            config.base_url = url;
        }
        config.api_key = non_blank(&lookup, "BO1_API_KEY");
        if let Some(flag) = non_blank(&lookup, "BO1_SSE_AUTO_RECONNECT") {
            config.auto_reconnect = parse_flag("BO1_SSE_AUTO_RECONNECT", &flag)?;
        }
        if let Some(delay) = non_blank(&lookup, "BO1_SSE_RECONNECT_DELAY_MS") {
            config.reconnect.delay_ms = parse_u64("BO1_SSE_RECONNECT_DELAY_MS", &delay)?;
        }
        if let Some(max) = non_blank(&lookup, "BO1_SSE_MAX_RECONNECT_ATTEMPTS") {
            config.reconnect.max_attempts = if max.eq_ignore_ascii_case("none") {
                None
            } else {
                match parse_u64("BO1_SSE_MAX_RECONNECT_ATTEMPTS", &max)? {
                    0 => None,
                    n => Some(u32::try_from(n).unwrap_or(u32::MAX)),
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document; missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, CoreError> {
        let config: Self = config::parse_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load_toml(path: &Path) -> Result<Self, CoreError> {
        let config: Self = config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the config can drive a client.
    pub fn validate(&self) -> Result<(), CoreError> {
        normalize_backend_base(&self.base_url)
            .map_err(|e| CoreError::config(format!("base_url {:?}: {}", self.base_url, e)))?;
        if self.connect_timeout_ms == 0 {
            return Err(CoreError::config("connect_timeout_ms must be positive"));
        }
        if self.idle_timeout_ms == Some(0) {
            return Err(CoreError::config("idle_timeout_ms must be positive when set"));
        }
        self.reconnect.validate()
    }

    /// Set the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the reconnect policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Disable automatic reconnection.
    pub fn without_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Keep the connection open after a `complete` event.
    pub fn keep_open_after_complete(mut self) -> Self {
        self.close_on_complete = false;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

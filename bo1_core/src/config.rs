//! Configuration utilities.
//!
//! This module provides:
//! - TOML file parsing into typed config structs
//! - Environment variable lookup helpers used by `from_env` constructors

use crate::errors::CoreError;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Default backend used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// =============================================================================
// TOML Parsing
// =============================================================================

/// Load a TOML file and deserialize it.
///
/// # Arguments
///
/// * `path` - Path to the TOML file
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, CoreError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CoreError::Config(format!("failed to read TOML file: {}", e)))?;

    parse_toml(&content)
}

/// Parse a TOML string.
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T, CoreError> {
    toml::from_str(content).map_err(|e| CoreError::Config(format!("failed to parse TOML: {}", e)))
}

// =============================================================================
// Environment
// =============================================================================

/// Read a non-blank value through `lookup`.
pub(crate) fn non_blank<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean flag the way shell users write them.
pub(crate) fn parse_flag(key: &str, value: &str) -> Result<bool, CoreError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CoreError::config(format!(
            "{key}: expected a boolean, got {other:?}"
        ))),
    }
}

/// Parse an unsigned integer setting.
pub(crate) fn parse_u64(key: &str, value: &str) -> Result<u64, CoreError> {
    value
        .parse::<u64>()
        .map_err(|e| CoreError::config(format!("{key}: {e}")))
}

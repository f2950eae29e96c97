//! Configuration loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`SdkConfig::default()`]
//! 2. If the config file exists, deep-merge its values over the defaults
//! 3. Apply `BEACON_*` environment overrides (highest priority)

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use beacon_core::config::{AppIdField, SdkConfig};
use beacon_core::ids::AppId;

/// Errors that can occur when loading or parsing the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load configuration from a JSON file with env var overrides.
///
/// A missing file yields the compiled defaults; invalid JSON is an error.
pub fn load_config(path: &Path) -> Result<SdkConfig, ConfigError> {
    let defaults = serde_json::to_value(SdkConfig::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading config from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "config file not found, using defaults");
        defaults
    };

    let mut config: SdkConfig = serde_json::from_value(merged)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Recursive deep merge of two JSON values.
///
/// Objects merge recursively (source overrides target per key); arrays and
/// primitives are replaced entirely; nulls in the source are skipped.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Invalid env values are silently ignored, falling back to file/defaults.
fn apply_env_overrides(config: &mut SdkConfig) {
    if let Some(v) = read_env_string("BEACON_APP_ID") {
        config.app_id = AppIdField(AppId::from_raw(v));
    }
    if let Some(v) = read_env_string("BEACON_API_BASE_URL") {
        config.api.base_url = v;
    }
    if let Some(v) = read_env_string("BEACON_API_KEY") {
        config.api.api_key = Some(v);
    }
    if let Some(v) = read_env_u64("BEACON_API_TIMEOUT_SECS", 1, 600) {
        config.api.timeout_secs = v;
    }
    if let Some(v) = read_env_u64("BEACON_SESSION_TIMEOUT_SECS", 1, 86_400) {
        config.session.inactivity_timeout_secs = v;
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| (min..=max).contains(v))
}

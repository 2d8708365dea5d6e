//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ArborSettings::default()`]
//! 2. If `~/.arbor/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ARBOR_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::types::{ArborSettings, LogFormat, is_level};

/// Root directory for Arbor state (`~/.arbor`, `/tmp/.arbor` without `HOME`).
pub fn arbor_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".arbor")
}

/// Resolve the path to the settings file (`~/.arbor/settings.json`).
pub fn settings_path() -> PathBuf {
    arbor_home().join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<ArborSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<ArborSettings> {
    let defaults = serde_json::to_value(ArborSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ArborSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
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

/// Apply `ARBOR_*` environment variables to loaded settings.
pub fn apply_env_overrides(settings: &mut ArborSettings) {
    apply_overrides(settings, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary key lookup.
///
/// | Key | Field | Accepted |
/// |---|---|---|
/// | `ARBOR_DB_PATH` | `database.path` | non-empty |
/// | `ARBOR_DB_POOL_SIZE` | `database.poolSize` | 1–64 |
/// | `ARBOR_DB_BUSY_TIMEOUT_MS` | `database.busyTimeoutMs` | 0–600000 |
/// | `ARBOR_LOG_LEVEL` | `logging.level` | tracing level or `off` |
/// | `ARBOR_LOG_FORMAT` | `logging.format` | `json` / `pretty` |
///
/// Invalid values are ignored with a warning.
pub fn apply_overrides<F>(settings: &mut ArborSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(v) = read("ARBOR_DB_PATH") {
        settings.database.path = v;
    }
    if let Some(v) = read("ARBOR_DB_POOL_SIZE") {
        match parse_u32_range(&v, 1, 64) {
            Some(n) => settings.database.pool_size = n,
            None => warn!(key = "ARBOR_DB_POOL_SIZE", value = %v, "invalid env var, ignoring"),
        }
    }
    if let Some(v) = read("ARBOR_DB_BUSY_TIMEOUT_MS") {
        match parse_u32_range(&v, 0, 600_000) {
            Some(n) => settings.database.busy_timeout_ms = n,
            None => {
                warn!(key = "ARBOR_DB_BUSY_TIMEOUT_MS", value = %v, "invalid env var, ignoring");
            }
        }
    }
    if let Some(v) = read("ARBOR_LOG_LEVEL") {
        if is_level(&v) {
            settings.logging.level = v.to_ascii_lowercase();
        } else {
            warn!(key = "ARBOR_LOG_LEVEL", value = %v, "invalid env var, ignoring");
        }
    }
    if let Some(v) = read("ARBOR_LOG_FORMAT") {
        match v.parse::<LogFormat>() {
            Ok(format) => settings.logging.format = format,
            Err(_) => warn!(key = "ARBOR_LOG_FORMAT", value = %v, "invalid env var, ignoring"),
        }
    }
}

/// Parse a string as a `u32` within an inclusive range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.trim().parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

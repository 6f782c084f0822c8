//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If the settings file exists, deep-merge user values over defaults
//! 3. Apply `MUSTER_*` environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::Settings;

/// Resolve the path to the settings file (`~/.muster/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".muster").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<Settings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: Settings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
#[must_use]
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

/// Apply environment variable overrides to loaded settings.
///
/// Integer values must parse and fall within the listed range; invalid
/// values are silently ignored (fall back to file/default).
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Some(v) = read_env_string("MUSTER_GROUP") {
        settings.group = v;
    }
    if let Some(v) = read_env_string("MUSTER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_u64("MUSTER_JOIN_TIMEOUT_MS", 100, 600_000) {
        settings.client.join_timeout_ms = v;
    }
    if let Some(v) = read_env_u64("MUSTER_HEARTBEAT_INTERVAL_MS", 100, 600_000) {
        settings.client.heartbeat_interval_ms = v;
    }
    if let Some(v) = read_env_u64("MUSTER_EXPIRY_WINDOW_MS", 100, 3_600_000) {
        settings.client.expiry_window_ms = v;
        settings.registry.expiry_window_ms = v;
    }
    if let Some(v) = read_env_u64("MUSTER_SWEEP_INTERVAL_MS", 100, 600_000) {
        settings.registry.sweep_interval_ms = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a `u64` within an inclusive range.
#[must_use]
pub fn parse_u64_in_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let parsed = val.trim().parse::<u64>().ok()?;
    (min..=max).contains(&parsed).then_some(parsed)
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    parse_u64_in_range(&raw, min, max)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! Settings document types.
//!
//! Serialized as camelCase JSON; every section and field has a compiled
//! default so a missing file, section, or key never fails loading.

use serde::{Deserialize, Serialize};

/// Root settings document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Deployment group isolating bus instances that share one broker.
    /// Empty means the unscoped well-known channels.
    pub group: String,
    /// Logging configuration.
    pub logging: LoggingSettings,
    /// Session client timing.
    pub client: ClientSettings,
    /// Worker registry timing.
    pub registry: RegistrySettings,
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level for the tracing subscriber (overridden by `RUST_LOG`).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Session client timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// How long to wait for a join response before re-publishing the request.
    pub join_timeout_ms: u64,
    /// Interval between heartbeat pings while active.
    pub heartbeat_interval_ms: u64,
    /// Inbound silence after which the registry is considered unreachable.
    pub expiry_window_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            join_timeout_ms: 2_000,
            heartbeat_interval_ms: 2_000,
            expiry_window_ms: 4_000,
        }
    }
}

/// Worker registry timing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrySettings {
    /// Interval between expiry sweeps.
    pub sweep_interval_ms: u64,
    /// Idle time after which a session is evicted.
    pub expiry_window_ms: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 2_000,
            expiry_window_ms: 4_000,
        }
    }
}

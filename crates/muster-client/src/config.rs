//! Session client runtime configuration.

use std::time::Duration;

use muster_protocol::WorkerKind;
use muster_settings::Settings;

/// Timing and identity-kind for one [`SessionClient`](crate::client::SessionClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Deployment group; scopes the allocator channel.
    pub group: String,
    /// What kind of worker this client announces itself as.
    pub kind: WorkerKind,
    /// How long to wait for a join response before re-publishing the request.
    pub join_timeout: Duration,
    /// Interval between heartbeat pings while active.
    pub heartbeat_interval: Duration,
    /// Inbound silence after which the registry is considered unreachable.
    pub expiry_window: Duration,
}

impl ClientConfig {
    /// Build from a loaded settings document.
    #[must_use]
    pub fn from_settings(settings: &Settings, kind: WorkerKind) -> Self {
        Self {
            group: settings.group.clone(),
            kind,
            join_timeout: Duration::from_millis(settings.client.join_timeout_ms),
            heartbeat_interval: Duration::from_millis(settings.client.heartbeat_interval_ms),
            expiry_window: Duration::from_millis(settings.client.expiry_window_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), WorkerKind::Console)
    }
}

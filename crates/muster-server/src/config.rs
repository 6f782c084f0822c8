//! Registry runtime configuration.

use std::time::Duration;

use muster_settings::Settings;

/// Timing and scoping for one [`RegistryServer`](crate::server::RegistryServer).
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Deployment group; scopes the allocator and worker channels.
    pub group: String,
    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,
    /// Idle time after which a session is evicted.
    pub expiry_window: Duration,
}

impl RegistryConfig {
    /// Build from a loaded settings document.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            group: settings.group.clone(),
            sweep_interval: Duration::from_millis(settings.registry.sweep_interval_ms),
            expiry_window: Duration::from_millis(settings.registry.expiry_window_ms),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_settings() {
        let config = RegistryConfig::default();
        assert_eq!(config.group, "");
        assert_eq!(config.sweep_interval, Duration::from_secs(2));
        assert_eq!(config.expiry_window, Duration::from_secs(4));
    }

    #[test]
    fn from_settings_converts_millis() {
        let mut settings = Settings::default();
        settings.group = "live".into();
        settings.registry.sweep_interval_ms = 250;
        settings.registry.expiry_window_ms = 900;

        let config = RegistryConfig::from_settings(&settings);
        assert_eq!(config.group, "live");
        assert_eq!(config.sweep_interval, Duration::from_millis(250));
        assert_eq!(config.expiry_window, Duration::from_millis(900));
    }
}

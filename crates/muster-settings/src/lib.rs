//! # muster-settings
//!
//! Layered configuration for the muster command bus:
//!
//! 1. Compiled defaults ([`Settings::default`])
//! 2. Deep-merged JSON settings file (optional)
//! 3. `MUSTER_*` environment variable overrides (highest priority)
//!
//! [`Settings::default`]: types::Settings::default

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ClientSettings, LoggingSettings, RegistrySettings, Settings};

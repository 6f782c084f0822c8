//! Settings loading errors.

use thiserror::Error;

/// Error raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file or merged document is not valid for [`crate::Settings`].
    #[error("invalid settings document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

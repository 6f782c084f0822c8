//! Transport-level errors.
//!
//! Unlike protocol anomalies (which the dispatch layer drops silently),
//! transport failures propagate to the caller of the failing operation.

use thiserror::Error;

/// Error from a bus operation.
#[derive(Debug, Error)]
pub enum BusError {
    /// The channel's delivery machinery is gone.
    #[error("channel {channel} is closed")]
    ChannelClosed {
        /// Channel the operation addressed.
        channel: String,
    },

    /// The underlying transport reported a failure.
    #[error("transport failure on {channel}: {message}")]
    Transport {
        /// Channel the operation addressed.
        channel: String,
        /// Transport-specific description.
        message: String,
    },
}

impl BusError {
    /// Convenience constructor for transport failures.
    #[must_use]
    pub fn transport(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

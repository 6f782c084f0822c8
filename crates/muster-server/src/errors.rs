//! Registry server errors.

use muster_bus::BusError;
use thiserror::Error;

/// Error from a registry server operation.
///
/// Only transport failures and lifecycle misuse surface here; protocol
/// anomalies are dropped inside the dispatch path by design.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The underlying bus operation failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// `serve` was called on a server that is already running.
    #[error("registry server is already running")]
    AlreadyRunning,
}

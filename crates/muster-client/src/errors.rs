//! Session client errors.

use muster_bus::BusError;
use thiserror::Error;

/// Error from a session client operation.
///
/// Liveness failures never show up here: heartbeat timeouts recover locally
/// through an automatic rejoin.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying bus operation failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// `start` was called on a client that already ran.
    #[error("session client was already started")]
    AlreadyStarted,
}

//! # muster-server
//!
//! The registry side of the muster session/presence protocol:
//!
//! - [`WorkerSession`]: one joined worker's identity, kind, channel, and
//!   last-seen time
//! - [`WorkerRegistry`]: the join/ping/sweep state machine
//! - [`RegistryServer`]: bus wiring — allocator subscription, typed
//!   dispatch, the periodic expiry sweep, and presence hook fan-out
//!
//! [`WorkerSession`]: session::WorkerSession
//! [`WorkerRegistry`]: registry::WorkerRegistry
//! [`RegistryServer`]: server::RegistryServer

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod hooks;
pub mod registry;
pub mod server;
pub mod session;

pub use config::RegistryConfig;
pub use errors::ServerError;
pub use hooks::PresenceHooks;
pub use registry::{JoinOutcome, WorkerRegistry};
pub use server::RegistryServer;
pub use session::WorkerSession;

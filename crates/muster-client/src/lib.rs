//! # muster-client
//!
//! The worker side of the muster session/presence protocol:
//!
//! - [`SessionClient`]: drives the join handshake on the allocator channel,
//!   migrates to the assigned dedicated channel, heartbeats, and rejoins
//!   on its own whenever the registry goes silent
//! - [`SessionHooks`]: the "now ready" extension point for application
//!   front-ends
//!
//! [`SessionClient`]: client::SessionClient
//! [`SessionHooks`]: hooks::SessionHooks

#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod errors;
pub mod hooks;

pub use client::{ClientState, SessionClient};
pub use config::ClientConfig;
pub use errors::ClientError;
pub use hooks::SessionHooks;

//! # muster-bus
//!
//! The narrow boundary the session/presence core requires from a
//! publish/subscribe transport, plus an in-process reference implementation:
//!
//! - [`MessageBus`]: `publish` / `subscribe` / `unsubscribe` with
//!   at-least-once, per-channel-ordered delivery
//! - [`SubscriberSet`]: explicit per-channel callback registry
//! - [`MemoryBus`]: in-process bus backing tests and single-process runs
//!
//! External brokers (Redis pub/sub and friends) implement [`MessageBus`]
//! out of tree; nothing above this boundary knows which transport is in use.

#![deny(unsafe_code)]

pub mod errors;
pub mod memory;
pub mod subscriber;
pub mod traits;

pub use errors::BusError;
pub use memory::MemoryBus;
pub use subscriber::SubscriberSet;
pub use traits::{BusCallback, MessageBus, SubscriberId, callback};

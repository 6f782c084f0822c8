//! # muster-core
//!
//! Foundation types and utilities shared by every muster crate:
//!
//! - **Branded IDs**: [`WorkerId`] and [`ChannelName`] newtypes for type safety
//! - **Channels**: well-known channel constants and group-scoped name builders
//! - **Time**: epoch-millisecond helpers for wire timestamps
//! - **Logging**: `tracing` subscriber bootstrap
//!
//! [`WorkerId`]: ids::WorkerId
//! [`ChannelName`]: ids::ChannelName

#![deny(unsafe_code)]

pub mod channels;
pub mod ids;
pub mod logging;
pub mod time;

pub use channels::{ALLOCATOR_CHANNEL, WORKER_CHANNEL_PREFIX, allocator_channel, worker_channel};
pub use ids::{ChannelName, WorkerId};
pub use logging::init_subscriber;
pub use time::tick_ms;

//! Well-known channel names and group-scoped builders.
//!
//! The bus uses two classes of channels: the fixed allocator channel where
//! join handshakes and worker-to-registry commands travel, and per-worker
//! dedicated channels handed out by the registry. A non-empty deployment
//! group isolates independent bus instances sharing one broker.

use crate::ids::ChannelName;

/// Well-known channel for join handshakes and worker-to-registry traffic.
pub const ALLOCATOR_CHANNEL: &str = "ib:aloc";

/// Prefix of registry-allocated per-worker channels.
pub const WORKER_CHANNEL_PREFIX: &str = "ib:clt";

/// Allocator channel name for a deployment group.
///
/// An empty group yields the bare well-known name.
#[must_use]
pub fn allocator_channel(group: &str) -> ChannelName {
    scoped(ALLOCATOR_CHANNEL, group)
}

/// Dedicated channel name for the `seq`-th allocation in a group.
#[must_use]
pub fn worker_channel(group: &str, seq: u64) -> ChannelName {
    ChannelName::from_string(format!("{}:{seq}", scoped(WORKER_CHANNEL_PREFIX, group)))
}

fn scoped(prefix: &str, group: &str) -> ChannelName {
    if group.is_empty() {
        ChannelName::from(prefix)
    } else {
        ChannelName::from_string(format!("{prefix}:{group}"))
    }
}

//! Server-side record of one joined worker.

use muster_core::{ChannelName, WorkerId};
use muster_protocol::WorkerKind;
use tokio::time::Instant;

/// One joined worker: identity, kind, assigned channel, last-seen time.
///
/// The registry exclusively owns session lifecycle; `last_seen_at` moves on
/// every heartbeat or routed message, the other fields never change.
#[derive(Clone, Debug)]
pub struct WorkerSession {
    /// Worker identity, unique within the registry.
    pub identity: WorkerId,
    /// What kind of worker this is.
    pub kind: WorkerKind,
    /// Dedicated channel, unique and immutable for the session's lifetime.
    pub channel: ChannelName,
    /// When the registry last heard from this worker.
    pub last_seen_at: Instant,
}

impl WorkerSession {
    /// Create a session that was just heard from.
    #[must_use]
    pub fn new(identity: WorkerId, kind: WorkerKind, channel: ChannelName, now: Instant) -> Self {
        Self {
            identity,
            kind,
            channel,
            last_seen_at: now,
        }
    }

    /// Record that the worker was heard from.
    pub fn touch(&mut self, now: Instant) {
        self.last_seen_at = now;
    }

    /// How long the worker has been silent.
    #[must_use]
    pub fn idle_for(&self, now: Instant) -> tokio::time::Duration {
        now.saturating_duration_since(self.last_seen_at)
    }
}

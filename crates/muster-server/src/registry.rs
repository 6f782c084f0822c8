//! The join/ping/sweep state machine.
//!
//! Pure state: no bus, no timers, every operation takes `now` explicitly.
//! [`RegistryServer`](crate::server::RegistryServer) drives it from the
//! dispatch flow and the sweep task, serialized behind one lock.

use std::collections::HashMap;
use std::time::Duration;

use muster_core::{ChannelName, WorkerId, worker_channel};
use muster_protocol::WorkerKind;
use tokio::time::Instant;

use crate::session::WorkerSession;

/// Result of handling one join request.
#[derive(Clone, Debug)]
pub enum JoinOutcome {
    /// The request was rejected (empty identity).
    Failed,
    /// The identity already holds a session; its channel is re-confirmed.
    Already {
        /// The existing dedicated channel.
        channel: ChannelName,
    },
    /// A fresh session was created.
    Joined {
        /// Snapshot of the new session, for responses and hooks.
        session: WorkerSession,
    },
}

/// Session table plus the monotonic channel allocator.
pub struct WorkerRegistry {
    group: String,
    sessions: HashMap<WorkerId, WorkerSession>,
    next_channel_seq: u64,
}

impl WorkerRegistry {
    /// Create an empty registry for a deployment group.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            sessions: HashMap::new(),
            next_channel_seq: 0,
        }
    }

    /// Handle one join request.
    ///
    /// - Empty identity: [`JoinOutcome::Failed`], no state change.
    /// - Known identity: refresh `last_seen_at`, re-confirm the channel
    ///   ([`JoinOutcome::Already`]). Duplicate and retried joins land here.
    /// - Unknown identity: allocate a channel and create the session
    ///   ([`JoinOutcome::Joined`]).
    pub fn handle_join(
        &mut self,
        identity: &WorkerId,
        kind: WorkerKind,
        now: Instant,
    ) -> JoinOutcome {
        if identity.is_empty() {
            return JoinOutcome::Failed;
        }
        if let Some(session) = self.sessions.get_mut(identity) {
            session.touch(now);
            return JoinOutcome::Already {
                channel: session.channel.clone(),
            };
        }
        let channel = self.allocate_channel();
        let session = WorkerSession::new(identity.clone(), kind, channel, now);
        let _ = self.sessions.insert(identity.clone(), session.clone());
        JoinOutcome::Joined { session }
    }

    /// Refresh a session's `last_seen_at`. Returns whether the identity is
    /// joined; a bare heartbeat never creates a session.
    pub fn touch(&mut self, identity: &WorkerId, now: Instant) -> bool {
        match self.sessions.get_mut(identity) {
            Some(session) => {
                session.touch(now);
                true
            }
            None => false,
        }
    }

    /// Dedicated channel of a joined identity.
    #[must_use]
    pub fn channel_of(&self, identity: &WorkerId) -> Option<ChannelName> {
        self.sessions.get(identity).map(|s| s.channel.clone())
    }

    /// Remove and return every session silent for longer than `expiry`.
    pub fn sweep(&mut self, now: Instant, expiry: Duration) -> Vec<WorkerSession> {
        let expired: Vec<WorkerId> = self
            .sessions
            .values()
            .filter(|s| s.idle_for(now) > expiry)
            .map(|s| s.identity.clone())
            .collect();
        expired
            .iter()
            .filter_map(|identity| self.sessions.remove(identity))
            .collect()
    }

    /// Number of joined workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no worker is joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether an identity is joined.
    #[must_use]
    pub fn contains(&self, identity: &WorkerId) -> bool {
        self.sessions.contains_key(identity)
    }

    /// Snapshot of every session.
    #[must_use]
    pub fn sessions(&self) -> Vec<WorkerSession> {
        self.sessions.values().cloned().collect()
    }

    /// Allocate the next dedicated channel.
    ///
    /// Strictly monotonic and never reused, even after expiry, so a stale
    /// client can never be routed into a newer worker's channel.
    fn allocate_channel(&mut self) -> ChannelName {
        let seq = self.next_channel_seq;
        self.next_channel_seq += 1;
        worker_channel(&self.group, seq)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

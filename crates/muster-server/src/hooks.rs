//! Presence notification hooks.

use async_trait::async_trait;

use crate::session::WorkerSession;

/// Application-level notifications about worker presence.
///
/// Both methods default to no-ops so a collaborator can implement only the
/// side it cares about. Hooks run on the registry's dispatch/sweep flow;
/// keep them short and never block on the worker they describe.
#[async_trait]
pub trait PresenceHooks: Send + Sync {
    /// A worker joined and was assigned `session.channel`.
    async fn on_worker_joined(&self, session: &WorkerSession) {
        let _ = session;
    }

    /// A worker's session expired and was removed.
    async fn on_worker_left(&self, session: &WorkerSession) {
        let _ = session;
    }
}

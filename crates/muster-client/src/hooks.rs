//! Client-side extension points.

use async_trait::async_trait;
use muster_core::ChannelName;

/// Application callbacks for session lifecycle moments.
///
/// `on_ready` fires every time a dedicated channel becomes active, which
/// includes each successful rejoin after an outage; front-ends start their
/// own command loops from here.
#[async_trait]
pub trait SessionHooks: Send + Sync {
    /// The client migrated onto its dedicated channel.
    async fn on_ready(&self, channel: &ChannelName) {
        let _ = channel;
    }
}

//! In-process reference transport.
//!
//! Each channel gets a subscriber set and a delivery task fed by an
//! unbounded queue: `publish` enqueues and returns, the task fans every
//! payload out to the subscribers registered at delivery time, awaiting
//! each callback so per-channel order is preserved end to end.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};
use tracing::trace;

use crate::errors::BusError;
use crate::subscriber::SubscriberSet;
use crate::traits::{BusCallback, MessageBus, SubscriberId};

struct ChannelState {
    subscribers: Arc<RwLock<SubscriberSet>>,
    tx: mpsc::UnboundedSender<Bytes>,
}

/// In-process [`MessageBus`] for tests and single-process deployments.
#[derive(Default)]
pub struct MemoryBus {
    channels: RwLock<HashMap<String, ChannelState>>,
}

impl MemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of channels with live delivery state.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of subscribers on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        match self.channels.read().await.get(channel) {
            Some(state) => state.subscribers.read().await.len(),
            None => 0,
        }
    }

    async fn with_channel<R>(
        &self,
        channel: &str,
        f: impl FnOnce(&ChannelState) -> R,
    ) -> R {
        {
            let channels = self.channels.read().await;
            if let Some(state) = channels.get(channel) {
                return f(state);
            }
        }
        let mut channels = self.channels.write().await;
        let state = channels
            .entry(channel.to_owned())
            .or_insert_with(|| spawn_channel(channel));
        f(state)
    }
}

/// Create delivery state for one channel and spawn its fan-out task.
///
/// The task ends when the channel entry (and with it the sender) is
/// dropped; payloads delivered while no subscriber is registered vanish,
/// which is exactly pub/sub semantics.
fn spawn_channel(channel: &str) -> ChannelState {
    let subscribers: Arc<RwLock<SubscriberSet>> = Arc::new(RwLock::new(SubscriberSet::new()));
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

    let task_subscribers = subscribers.clone();
    let task_channel = channel.to_owned();
    drop(tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let callbacks = task_subscribers.read().await.snapshot();
            trace!(
                channel = %task_channel,
                bytes = payload.len(),
                subscribers = callbacks.len(),
                "delivering"
            );
            for callback in callbacks {
                callback(payload.clone()).await;
            }
        }
    }));

    ChannelState { subscribers, tx }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BusError> {
        self.with_channel(channel, |state| {
            state.tx.send(payload).map_err(|_| BusError::ChannelClosed {
                channel: channel.to_owned(),
            })
        })
        .await
    }

    async fn subscribe(
        &self,
        channel: &str,
        callback: BusCallback,
    ) -> Result<SubscriberId, BusError> {
        let subscribers = self
            .with_channel(channel, |state| state.subscribers.clone())
            .await;
        let id = subscribers.write().await.add(callback);
        Ok(id)
    }

    async fn unsubscribe(
        &self,
        channel: &str,
        subscriber: Option<SubscriberId>,
    ) -> Result<(), BusError> {
        let channels = self.channels.read().await;
        let Some(state) = channels.get(channel) else {
            return Ok(());
        };
        let mut subscribers = state.subscribers.write().await;
        match subscriber {
            Some(id) => subscribers.remove(id),
            None => subscribers.clear(),
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

//! The transport boundary consumed by the session/presence core.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;

use crate::errors::BusError;

/// Asynchronous delivery callback: receives the raw bytes of one delivery.
pub type BusCallback = Arc<dyn Fn(Bytes) -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle identifying one subscription on one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(crate) u64);

/// Wrap an async closure as a [`BusCallback`].
pub fn callback<F, Fut>(f: F) -> BusCallback
where
    F: Fn(Bytes) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |payload| Box::pin(f(payload)))
}

/// A byte-oriented publish/subscribe transport.
///
/// Guarantees required by the core: deliveries on one channel reach each
/// subscriber in publish order, at least once. Nothing is assumed about
/// ordering across channels or about message uniqueness. `publish` is
/// fire-and-forget: it returns once the transport accepted the payload,
/// not once subscribers saw it.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish one payload to a channel.
    async fn publish(&self, channel: &str, payload: Bytes) -> Result<(), BusError>;

    /// Register a delivery callback on a channel.
    async fn subscribe(&self, channel: &str, callback: BusCallback)
    -> Result<SubscriberId, BusError>;

    /// Remove one subscription, or every subscription on the channel when
    /// `subscriber` is `None`. Unknown channels and ids are a no-op.
    async fn unsubscribe(
        &self,
        channel: &str,
        subscriber: Option<SubscriberId>,
    ) -> Result<(), BusError>;
}

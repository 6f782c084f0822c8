//! Tag-to-handler routing.
//!
//! One asynchronous handler per type tag. The first registration for a tag
//! wins; later registrations for the same tag are silent no-ops, so wiring
//! code can layer default handlers under application ones without clobbering
//! them. Unknown tags and undecodable text are dropped without error: the
//! bus is shared, and traffic for other workers or newer protocol revisions
//! is expected on the same flow.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use futures::future::BoxFuture;
use tracing::{debug, trace};

use crate::envelope::Envelope;
use crate::messages::{WireMessage, decode};

type BoxedHandler = Box<dyn Fn(Envelope) -> BoxFuture<'static, ()> + Send + Sync>;

/// Routes decoded envelopes to typed handlers by tag.
///
/// A dispatcher is owned by exactly one client or server; handlers run
/// strictly sequentially because [`dispatch`](Self::dispatch) awaits each
/// one before the caller feeds the next message.
#[derive(Default)]
pub struct Dispatcher {
    handlers: HashMap<u32, BoxedHandler>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `M`'s tag.
    ///
    /// The first handler registered for a tag is kept; re-registration is a
    /// silent no-op.
    pub fn register<M, H, Fut>(&mut self, handler: H)
    where
        M: WireMessage + Send + 'static,
        H: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        match self.handlers.entry(M::URI) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(Box::new(move |envelope| {
                    Box::pin(handler(decode::<M>(&envelope)))
                }));
            }
            Entry::Occupied(_) => {
                debug!(uri = M::URI, "handler already registered for tag, keeping first");
            }
        }
    }

    /// Decode one wire payload and run its handler to completion.
    ///
    /// Text that does not parse to an envelope, or whose tag has no
    /// handler, is dropped silently.
    pub async fn dispatch(&self, raw: &str) {
        let Some(envelope) = Envelope::parse(raw) else {
            debug!(len = raw.len(), "dropping undecodable envelope");
            return;
        };
        match self.handlers.get(&envelope.uri) {
            Some(handler) => handler(envelope).await,
            None => trace!(uri = envelope.uri, "no handler for tag, dropping"),
        }
    }

    /// Whether a handler is registered for a tag.
    #[must_use]
    pub fn is_registered(&self, uri: u32) -> bool {
        self.handlers.contains_key(&uri)
    }

    /// Registered tags (sorted).
    #[must_use]
    pub fn tags(&self) -> Vec<u32> {
        let mut tags: Vec<u32> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

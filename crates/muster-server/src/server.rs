//! Bus wiring for the worker registry.
//!
//! [`RegistryServer`] subscribes the allocator channel, routes decoded
//! messages into [`WorkerRegistry`] through a typed dispatcher, answers on
//! the allocator (join responses) and dedicated channels (pongs, pushed
//! commands), and runs the periodic expiry sweep. Registry state is guarded
//! by one async mutex: the dispatch flow is sequential by construction and
//! the sweep task takes the same lock, so no session is ever mutated
//! concurrently.

use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use muster_bus::{MessageBus, SubscriberId, callback};
use muster_core::{ChannelName, WorkerId, allocator_channel};
use muster_protocol::{
    Dispatcher, FrameDecoder, JoinRequest, JoinResponse, JoinStatus, Ping, Pong, WireMessage,
    encode, encode_frame,
};

use crate::config::RegistryConfig;
use crate::errors::ServerError;
use crate::hooks::PresenceHooks;
use crate::registry::{JoinOutcome, WorkerRegistry};
use crate::session::WorkerSession;

/// The registry side of the session/presence protocol.
///
/// Lifecycle is explicit: create, attach hooks and application handlers,
/// [`serve`](Self::serve), [`shutdown`](Self::shutdown). Dropping without
/// shutdown leaks only the sweep task until the process exits.
pub struct RegistryServer {
    inner: Arc<Inner>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

struct Inner {
    bus: Arc<dyn MessageBus>,
    config: RegistryConfig,
    allocator: ChannelName,
    registry: AsyncMutex<WorkerRegistry>,
    hooks: parking_lot::RwLock<Vec<Arc<dyn PresenceHooks>>>,
    cancel: CancellationToken,
    subscription: AsyncMutex<Option<SubscriberId>>,
}

impl RegistryServer {
    /// Create a registry server over a bus.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, config: RegistryConfig) -> Self {
        let allocator = allocator_channel(&config.group);
        let registry = WorkerRegistry::new(config.group.clone());
        let inner = Arc::new(Inner {
            bus,
            config,
            allocator,
            registry: AsyncMutex::new(registry),
            hooks: parking_lot::RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
            subscription: AsyncMutex::new(None),
        });

        let mut dispatcher = Dispatcher::new();
        let join_inner = inner.clone();
        dispatcher.register::<JoinRequest, _, _>(move |request: JoinRequest| {
            let inner = join_inner.clone();
            async move { inner.on_join_request(request).await }
        });
        let ping_inner = inner.clone();
        dispatcher.register::<Ping, _, _>(move |ping: Ping| {
            let inner = ping_inner.clone();
            async move { inner.on_ping(ping).await }
        });

        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Attach a presence hook. Call before [`serve`](Self::serve).
    pub fn add_hooks(&self, hooks: Arc<dyn PresenceHooks>) {
        self.inner.hooks.write().push(hooks);
    }

    /// Register an application handler for messages arriving on the
    /// allocator channel. Call before [`serve`](Self::serve).
    ///
    /// The protocol's own tags are claimed first, so an application handler
    /// for them is a silent no-op.
    pub fn add_handler<M, H, Fut>(&self, handler: H)
    where
        M: WireMessage + Send + 'static,
        H: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(dispatcher) = self.dispatcher.lock().as_mut() {
            dispatcher.register::<M, _, _>(handler);
        }
    }

    /// Subscribe the allocator channel and start the expiry sweep.
    pub async fn serve(&self) -> Result<(), ServerError> {
        let Some(dispatcher) = self.dispatcher.lock().take() else {
            return Err(ServerError::AlreadyRunning);
        };
        let dispatcher = Arc::new(dispatcher);

        let decoder = Arc::new(AsyncMutex::new(FrameDecoder::new()));
        let on_delivery = callback(move |payload| {
            let dispatcher = dispatcher.clone();
            let decoder = decoder.clone();
            async move {
                let frames = decoder.lock().await.feed(&payload);
                for frame in frames {
                    dispatcher.dispatch(&frame).await;
                }
            }
        });

        let id = self
            .inner
            .bus
            .subscribe(self.inner.allocator.as_str(), on_delivery)
            .await?;
        *self.inner.subscription.lock().await = Some(id);

        let sweep_inner = self.inner.clone();
        let cancel = self.inner.cancel.clone();
        let _ = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_inner.config.sweep_interval);
            // Skip the immediate first tick
            let _ = interval.tick().await;
            loop {
                tokio::select! {
                    _ = interval.tick() => sweep_inner.run_sweep().await,
                    () = cancel.cancelled() => {
                        debug!("sweep task cancelled");
                        return;
                    }
                }
            }
        });

        info!(channel = %self.inner.allocator, "registry serving");
        Ok(())
    }

    /// Stop the sweep and drop the allocator subscription. Idempotent.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        self.inner.cancel.cancel();
        if let Some(id) = self.inner.subscription.lock().await.take() {
            self.inner
                .bus
                .unsubscribe(self.inner.allocator.as_str(), Some(id))
                .await?;
            info!("registry shut down");
        }
        Ok(())
    }

    /// Frame and publish a message to a joined worker's dedicated channel.
    ///
    /// Returns `Ok(false)` for an unknown identity; transport failures
    /// propagate.
    pub async fn send_to_worker<M: WireMessage>(
        &self,
        identity: &WorkerId,
        message: &M,
    ) -> Result<bool, ServerError> {
        let channel = self.inner.registry.lock().await.channel_of(identity);
        let Some(channel) = channel else {
            return Ok(false);
        };
        let frame = encode_frame(&encode(message).to_wire());
        self.inner.bus.publish(channel.as_str(), frame).await?;
        Ok(true)
    }

    /// Number of joined workers.
    pub async fn worker_count(&self) -> usize {
        self.inner.registry.lock().await.len()
    }

    /// Snapshot of every joined session.
    pub async fn sessions(&self) -> Vec<WorkerSession> {
        self.inner.registry.lock().await.sessions()
    }

    /// The allocator channel this server answers on.
    #[must_use]
    pub fn allocator(&self) -> &ChannelName {
        &self.inner.allocator
    }
}

impl Inner {
    async fn on_join_request(&self, request: JoinRequest) {
        let identity = WorkerId::from(request.identity);
        let kind = request.worker_kind;
        let outcome = self
            .registry
            .lock()
            .await
            .handle_join(&identity, kind, Instant::now());

        match outcome {
            JoinOutcome::Failed => {
                info!(kind = kind.label(), "join request with empty identity rejected");
                counter!("muster_join_failures_total").increment(1);
                self.respond_join(&identity, "", JoinStatus::Failed).await;
            }
            JoinOutcome::Already { channel } => {
                info!(
                    kind = kind.label(),
                    identity = %identity,
                    channel = %channel,
                    "join request: already joined"
                );
                counter!("muster_rejoins_total").increment(1);
                self.respond_join(&identity, channel.as_str(), JoinStatus::Already)
                    .await;
            }
            JoinOutcome::Joined { session } => {
                info!(
                    kind = kind.label(),
                    identity = %identity,
                    channel = %session.channel,
                    "join request: worker joined"
                );
                counter!("muster_joins_total").increment(1);
                gauge!("muster_workers_active").increment(1.0);
                self.respond_join(&identity, session.channel.as_str(), JoinStatus::Success)
                    .await;
                for hooks in self.hooks_snapshot() {
                    hooks.on_worker_joined(&session).await;
                }
            }
        }
    }

    async fn on_ping(&self, ping: Ping) {
        let identity = WorkerId::from(ping.identity);
        let channel = {
            let mut registry = self.registry.lock().await;
            if registry.touch(&identity, Instant::now()) {
                registry.channel_of(&identity)
            } else {
                None
            }
        };
        match channel {
            Some(channel) => {
                let pong = Pong {
                    echoed_timestamp: ping.timestamp,
                };
                self.publish_message(channel.as_str(), &pong).await;
            }
            // Only an explicit join creates a session; a bare heartbeat
            // from an unknown identity is ignored.
            None => debug!(identity = %identity, "ping from unknown identity ignored"),
        }
    }

    async fn run_sweep(&self) {
        let evicted = self
            .registry
            .lock()
            .await
            .sweep(Instant::now(), self.config.expiry_window);
        if evicted.is_empty() {
            return;
        }

        let identities: Vec<&str> = evicted.iter().map(|s| s.identity.as_str()).collect();
        warn!(?identities, "removing timed-out workers");
        counter!("muster_evictions_total").increment(evicted.len() as u64);
        gauge!("muster_workers_active").decrement(evicted.len() as f64);

        let hooks = self.hooks_snapshot();
        for session in &evicted {
            for hook in &hooks {
                hook.on_worker_left(session).await;
            }
        }
    }

    async fn respond_join(&self, identity: &WorkerId, channel: &str, status: JoinStatus) {
        let response = JoinResponse {
            identity: identity.as_str().to_owned(),
            channel: channel.to_owned(),
            status,
        };
        self.publish_message(self.allocator.as_str(), &response).await;
    }

    /// Frame and publish on a channel, logging transport failures.
    ///
    /// Handler paths have no caller to propagate to; the failure is logged
    /// and the peer recovers through its own timeout machinery.
    async fn publish_message<M: WireMessage>(&self, channel: &str, message: &M) {
        let frame = encode_frame(&encode(message).to_wire());
        if let Err(e) = self.bus.publish(channel, frame).await {
            error!(channel, error = %e, "failed to publish");
        }
    }

    fn hooks_snapshot(&self) -> Vec<Arc<dyn PresenceHooks>> {
        self.hooks.read().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use muster_bus::MemoryBus;
    use muster_protocol::decode;
    use parking_lot::Mutex;
    use std::time::Duration;

    /// Capture decoded envelopes of one message type from a channel.
    struct Probe<M> {
        seen: Arc<Mutex<Vec<M>>>,
    }

    impl<M: WireMessage + Send + 'static> Probe<M> {
        async fn attach(bus: &Arc<MemoryBus>, channel: &str) -> Self {
            let seen: Arc<Mutex<Vec<M>>> = Arc::new(Mutex::new(Vec::new()));
            let sink = seen.clone();
            let decoder = Arc::new(AsyncMutex::new(FrameDecoder::new()));
            let cb = callback(move |payload: Bytes| {
                let sink = sink.clone();
                let decoder = decoder.clone();
                async move {
                    for frame in decoder.lock().await.feed(&payload) {
                        if let Some(envelope) = muster_protocol::Envelope::parse(&frame)
                            && envelope.uri == M::URI
                        {
                            sink.lock().push(decode::<M>(&envelope));
                        }
                    }
                }
            });
            let _ = bus.subscribe(channel, cb).await.unwrap();
            Self { seen }
        }

        fn messages(&self) -> Vec<M>
        where
            M: Clone,
        {
            self.seen.lock().clone()
        }
    }

    #[derive(Default)]
    struct RecordingHooks {
        joined: Mutex<Vec<String>>,
        left: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl PresenceHooks for RecordingHooks {
        async fn on_worker_joined(&self, session: &WorkerSession) {
            self.joined.lock().push(session.identity.to_string());
        }
        async fn on_worker_left(&self, session: &WorkerSession) {
            self.left.lock().push(session.identity.to_string());
        }
    }

    async fn settle() {
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
    }

    async fn publish_message<M: WireMessage>(bus: &Arc<MemoryBus>, channel: &str, message: &M) {
        bus.publish(channel, encode_frame(&encode(message).to_wire()))
            .await
            .unwrap();
    }

    fn join(identity: &str) -> JoinRequest {
        JoinRequest {
            identity: identity.into(),
            worker_kind: muster_protocol::WorkerKind::Console,
        }
    }

    async fn started_server(bus: &Arc<MemoryBus>) -> RegistryServer {
        let server = RegistryServer::new(bus.clone(), RegistryConfig::default());
        server.serve().await.unwrap();
        server
    }

    #[tokio::test(start_paused = true)]
    async fn join_assigns_first_channel_and_replies_success() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        let responses = Probe::<JoinResponse>::attach(&bus, "ib:aloc").await;

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        let got = responses.messages();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].identity, "w1");
        assert_eq!(got[0].channel, "ib:clt:0");
        assert_eq!(got[0].status, JoinStatus::Success);
        assert_eq!(server.worker_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_join_replies_already_with_same_channel() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        let responses = Probe::<JoinResponse>::attach(&bus, "ib:aloc").await;

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        let got = responses.messages();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].status, JoinStatus::Success);
        assert_eq!(got[1].status, JoinStatus::Already);
        assert_eq!(got[0].channel, got[1].channel);
        assert_eq!(server.worker_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_identity_join_fails() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        let responses = Probe::<JoinResponse>::attach(&bus, "ib:aloc").await;

        publish_message(&bus, "ib:aloc", &join("")).await;
        settle().await;

        let got = responses.messages();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].status, JoinStatus::Failed);
        assert!(got[0].channel.is_empty());
        assert_eq!(server.worker_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn ping_answers_pong_on_dedicated_channel() {
        let bus = Arc::new(MemoryBus::new());
        let _server = started_server(&bus).await;

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        let pongs = Probe::<Pong>::attach(&bus, "ib:clt:0").await;
        publish_message(
            &bus,
            "ib:aloc",
            &Ping {
                identity: "w1".into(),
                timestamp: 123_456,
            },
        )
        .await;
        settle().await;

        let got = pongs.messages();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].echoed_timestamp, 123_456);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_identity_ping_is_a_noop() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        let responses = Probe::<JoinResponse>::attach(&bus, "ib:aloc").await;

        publish_message(
            &bus,
            "ib:aloc",
            &Ping {
                identity: "ghost".into(),
                timestamp: 1,
            },
        )
        .await;
        settle().await;

        assert_eq!(server.worker_count().await, 0, "no implicit registration");
        assert!(responses.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_silent_worker_with_one_left_notification() {
        let bus = Arc::new(MemoryBus::new());
        let server = RegistryServer::new(bus.clone(), RegistryConfig::default());
        let hooks = Arc::new(RecordingHooks::default());
        server.add_hooks(hooks.clone());
        server.serve().await.unwrap();

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;
        assert_eq!(hooks.joined.lock().clone(), vec!["w1".to_owned()]);

        // Past the expiry window plus several sweep cycles: exactly one
        // eviction notification.
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(2)).await;
            settle().await;
        }

        assert_eq!(server.worker_count().await, 0);
        assert_eq!(hooks.left.lock().clone(), vec!["w1".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_keep_session_alive_across_sweeps() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(2)).await;
            publish_message(
                &bus,
                "ib:aloc",
                &Ping {
                    identity: "w1".into(),
                    timestamp: 0,
                },
            )
            .await;
            settle().await;
        }

        assert_eq!(server.worker_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn send_to_worker_reaches_only_the_addressed_channel() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        publish_message(&bus, "ib:aloc", &join("w2")).await;
        settle().await;

        let w1 = Probe::<muster_protocol::CommandResponse>::attach(&bus, "ib:clt:0").await;
        let w2 = Probe::<muster_protocol::CommandResponse>::attach(&bus, "ib:clt:1").await;

        let delivered = server
            .send_to_worker(
                &WorkerId::from("w2"),
                &muster_protocol::CommandResponse {
                    status: 0,
                    output: "done".into(),
                },
            )
            .await
            .unwrap();
        settle().await;

        assert!(delivered);
        assert!(w1.messages().is_empty());
        assert_eq!(w2.messages().len(), 1);
        assert_eq!(w2.messages()[0].output, "done");
    }

    #[tokio::test(start_paused = true)]
    async fn send_to_unknown_worker_publishes_nothing() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;

        let delivered = server
            .send_to_worker(
                &WorkerId::from("ghost"),
                &Pong {
                    echoed_timestamp: 1,
                },
            )
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test(start_paused = true)]
    async fn serve_twice_is_an_error() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        assert!(matches!(
            server.serve().await,
            Err(ServerError::AlreadyRunning)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_answering_joins() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;
        let responses = Probe::<JoinResponse>::attach(&bus, "ib:aloc").await;

        server.shutdown().await.unwrap();
        server.shutdown().await.unwrap(); // idempotent

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        assert!(responses.messages().is_empty());
        assert_eq!(server.worker_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn application_handler_sees_command_requests() {
        use muster_protocol::CommandRequest;

        let bus = Arc::new(MemoryBus::new());
        let server = RegistryServer::new(bus.clone(), RegistryConfig::default());

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        server.add_handler::<CommandRequest, _, _>(move |request: CommandRequest| {
            let sink = sink.clone();
            async move {
                sink.lock().push(request.command);
            }
        });
        server.serve().await.unwrap();

        publish_message(
            &bus,
            "ib:aloc",
            &CommandRequest {
                identity: "console-1".into(),
                command: "positions".into(),
            },
        )
        .await;
        settle().await;

        assert_eq!(*seen.lock(), vec!["positions".to_owned()]);
    }

    #[tokio::test(start_paused = true)]
    async fn application_handler_cannot_shadow_protocol_tags() {
        let bus = Arc::new(MemoryBus::new());
        let server = RegistryServer::new(bus.clone(), RegistryConfig::default());
        // Tries to steal the join tag; the protocol handler registered
        // first, so joins still work.
        server.add_handler::<JoinRequest, _, _>(|_request: JoinRequest| async {});
        server.serve().await.unwrap();

        publish_message(&bus, "ib:aloc", &join("w1")).await;
        settle().await;

        assert_eq!(server.worker_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_traffic_on_allocator_is_dropped() {
        let bus = Arc::new(MemoryBus::new());
        let server = started_server(&bus).await;

        // The registry's own response tag, an unknown tag, and garbage all
        // fall into the silent-drop path.
        publish_message(
            &bus,
            "ib:aloc",
            &JoinResponse {
                identity: "w9".into(),
                channel: "ib:clt:9".into(),
                status: JoinStatus::Success,
            },
        )
        .await;
        bus.publish("ib:aloc", encode_frame("{\"uri\":99}"))
            .await
            .unwrap();
        bus.publish("ib:aloc", encode_frame("not even json"))
            .await
            .unwrap();
        settle().await;

        assert_eq!(server.worker_count().await, 0);
    }
}

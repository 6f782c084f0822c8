//! The session client state machine.
//!
//! `Idle -> Joining -> Active`, and back to `Joining` whenever the registry
//! goes silent for longer than the expiry window. Join requests and
//! heartbeats are published on the allocator channel; join responses arrive
//! there while joining, everything else arrives on the dedicated channel
//! assigned at join time. Every inbound delivery, whatever its type, moves
//! the last-active watermark, so any liveness signal suppresses a false
//! timeout.
//!
//! The client owns exactly one join retry task and one heartbeat task at a
//! time; starting either cancels its predecessor, and all cancellations are
//! idempotent.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use muster_bus::{BusCallback, MessageBus, SubscriberId, callback};
use muster_core::{ChannelName, WorkerId, allocator_channel, tick_ms};
use muster_protocol::{
    Dispatcher, FrameDecoder, JoinRequest, JoinResponse, JoinStatus, Ping, Pong, WireMessage,
    encode, encode_frame,
};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::hooks::SessionHooks;

/// Observable session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Not started, or closed.
    Idle,
    /// Handshaking on the allocator channel.
    Joining,
    /// Heartbeating on a dedicated channel.
    Active,
}

/// One worker's connection to the command bus.
///
/// Lifecycle: [`new`](Self::new), optionally [`add_handler`](Self::add_handler)
/// and [`add_hooks`](Self::add_hooks), then [`start`](Self::start) once and
/// [`close`](Self::close) when done.
pub struct SessionClient {
    inner: Arc<Inner>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

struct Inner {
    bus: Arc<dyn MessageBus>,
    config: ClientConfig,
    identity: WorkerId,
    allocator: ChannelName,
    state: Mutex<ClientState>,
    /// Dedicated channel plus its subscription, while active.
    channel_sub: Mutex<Option<(ChannelName, SubscriberId)>>,
    allocator_sub: Mutex<Option<SubscriberId>>,
    /// When the registry (or anyone) was last heard from.
    last_active: Mutex<Instant>,
    /// Latest measured round trip in milliseconds, -1 before the first pong.
    rtt_ms: AtomicI64,
    join_cancel: Mutex<Option<CancellationToken>>,
    heartbeat_cancel: Mutex<Option<CancellationToken>>,
    /// Stops the inbound processing task on close.
    lifetime: CancellationToken,
    inbound_tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
    hooks: parking_lot::RwLock<Vec<Arc<dyn SessionHooks>>>,
    started: AtomicBool,
}

impl SessionClient {
    /// Create a client with a fresh identity.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, config: ClientConfig) -> Self {
        Self::with_identity(bus, config, WorkerId::new())
    }

    /// Create a client with a caller-chosen identity.
    #[must_use]
    pub fn with_identity(bus: Arc<dyn MessageBus>, config: ClientConfig, identity: WorkerId) -> Self {
        let allocator = allocator_channel(&config.group);
        let inner = Arc::new(Inner {
            bus,
            config,
            identity,
            allocator,
            state: Mutex::new(ClientState::Idle),
            channel_sub: Mutex::new(None),
            allocator_sub: Mutex::new(None),
            last_active: Mutex::new(Instant::now()),
            rtt_ms: AtomicI64::new(-1),
            join_cancel: Mutex::new(None),
            heartbeat_cancel: Mutex::new(None),
            lifetime: CancellationToken::new(),
            inbound_tx: Mutex::new(None),
            hooks: parking_lot::RwLock::new(Vec::new()),
            started: AtomicBool::new(false),
        });

        let mut dispatcher = Dispatcher::new();
        let join_inner = inner.clone();
        dispatcher.register::<JoinResponse, _, _>(move |response: JoinResponse| {
            let inner = join_inner.clone();
            async move { inner.on_join_response(response).await }
        });
        let pong_inner = inner.clone();
        dispatcher.register::<Pong, _, _>(move |pong: Pong| {
            let inner = pong_inner.clone();
            async move { inner.on_pong(pong) }
        });

        Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Register an application handler for messages arriving on this
    /// client's channels. Call before [`start`](Self::start).
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

    /// Attach lifecycle hooks. Call before [`start`](Self::start).
    pub fn add_hooks(&self, hooks: Arc<dyn SessionHooks>) {
        self.inner.hooks.write().push(hooks);
    }

    /// Start the inbound processing task and begin the join handshake.
    pub async fn start(&self) -> Result<(), ClientError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }
        let Some(dispatcher) = self.dispatcher.lock().take() else {
            return Err(ClientError::AlreadyStarted);
        };
        let dispatcher = Arc::new(dispatcher);

        // Inbound messages queue here and are handled one at a time, in
        // arrival order, by a single processing task.
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.inner.inbound_tx.lock() = Some(tx);
        let lifetime = self.inner.lifetime.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => match message {
                        Some(text) => dispatcher.dispatch(&text).await,
                        None => return,
                    },
                    () = lifetime.cancelled() => return,
                }
            }
        });

        info!(identity = %self.inner.identity, "session client starting");
        self.inner.join().await
    }

    /// Cancel every task and subscription and return to `Idle`. Idempotent.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.inner.cancel_join();
        self.inner.cancel_heartbeat();
        self.inner.lifetime.cancel();
        *self.inner.inbound_tx.lock() = None;

        let allocator_sub = self.inner.allocator_sub.lock().take();
        if let Some(id) = allocator_sub {
            self.inner
                .bus
                .unsubscribe(self.inner.allocator.as_str(), Some(id))
                .await?;
        }
        let channel_sub = self.inner.channel_sub.lock().take();
        if let Some((channel, id)) = channel_sub {
            self.inner.bus.unsubscribe(channel.as_str(), Some(id)).await?;
        }

        *self.inner.state.lock() = ClientState::Idle;
        info!(identity = %self.inner.identity, "session client closed");
        Ok(())
    }

    /// Frame and publish an application message toward the registry side.
    pub async fn send<M: WireMessage>(&self, message: &M) -> Result<(), ClientError> {
        self.inner.publish_message(message).await?;
        Ok(())
    }

    /// This client's fixed identity.
    #[must_use]
    pub fn identity(&self) -> &WorkerId {
        &self.inner.identity
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.inner.state.lock()
    }

    /// The dedicated channel, while active.
    #[must_use]
    pub fn channel(&self) -> Option<ChannelName> {
        self.inner
            .channel_sub
            .lock()
            .as_ref()
            .map(|(channel, _)| channel.clone())
    }

    /// Latest measured round trip, if a pong has arrived yet.
    #[must_use]
    pub fn rtt_ms(&self) -> Option<i64> {
        let rtt = self.inner.rtt_ms.load(Ordering::Relaxed);
        (rtt >= 0).then_some(rtt)
    }
}

impl Inner {
    /// Enter `Joining`: subscribe the allocator channel, publish a join
    /// request, and arm the unbounded retry loop.
    async fn join(self: &Arc<Self>) -> Result<(), ClientError> {
        *self.state.lock() = ClientState::Joining;

        let token = CancellationToken::new();
        if let Some(previous) = self.join_cancel.lock().replace(token.clone()) {
            previous.cancel();
        }

        if self.allocator_sub.lock().is_none() {
            let id = self
                .bus
                .subscribe(self.allocator.as_str(), self.delivery_callback())
                .await?;
            *self.allocator_sub.lock() = Some(id);
        }

        info!(
            identity = %self.identity,
            kind = self.config.kind.label(),
            "requesting channel"
        );
        self.publish_join_request().await?;

        let retry_inner = self.clone();
        let _ = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    () = sleep(retry_inner.config.join_timeout) => {
                        warn!(identity = %retry_inner.identity, "join timed out, retrying");
                        if let Err(e) = retry_inner.publish_join_request().await {
                            error!(error = %e, "failed to re-publish join request");
                        }
                    }
                }
            }
        });
        Ok(())
    }

    async fn on_join_response(self: &Arc<Self>, response: JoinResponse) {
        if response.identity != self.identity.as_str() {
            return;
        }
        if *self.state.lock() != ClientState::Joining {
            // At-least-once delivery: a duplicate response after migration
            // must not re-run the channel switch.
            debug!("join response while not joining ignored");
            return;
        }
        if response.channel.is_empty() {
            warn!("join response with empty channel ignored");
            return;
        }
        info!(
            channel = %response.channel,
            status = ?response.status,
            "join response"
        );
        if !matches!(response.status, JoinStatus::Success | JoinStatus::Already) {
            return;
        }

        self.cancel_join();

        let allocator_sub = self.allocator_sub.lock().take();
        if let Some(id) = allocator_sub
            && let Err(e) = self
                .bus
                .unsubscribe(self.allocator.as_str(), Some(id))
                .await
        {
            warn!(error = %e, "failed to unsubscribe allocator channel");
        }

        let channel = ChannelName::from(response.channel.as_str());
        match self
            .bus
            .subscribe(channel.as_str(), self.delivery_callback())
            .await
        {
            Ok(id) => {
                *self.channel_sub.lock() = Some((channel.clone(), id));
            }
            Err(e) => {
                error!(error = %e, channel = %channel, "failed to subscribe dedicated channel");
                self.rejoin().await;
                return;
            }
        }

        self.note_activity();
        *self.state.lock() = ClientState::Active;
        self.start_heartbeat();

        let hooks_snapshot = self.hooks.read().clone();
        for hooks in hooks_snapshot {
            hooks.on_ready(&channel).await;
        }
    }

    fn on_pong(&self, pong: Pong) {
        let rtt = tick_ms() - pong.echoed_timestamp;
        self.rtt_ms.store(rtt, Ordering::Relaxed);
        debug!(rtt_ms = rtt, "pong");
    }

    /// Arm the heartbeat loop, replacing any prior one.
    fn start_heartbeat(self: &Arc<Self>) {
        let token = CancellationToken::new();
        if let Some(previous) = self.heartbeat_cancel.lock().replace(token.clone()) {
            previous.cancel();
        }

        let inner = self.clone();
        let _ = tokio::spawn(async move {
            let period = inner.config.heartbeat_interval;
            let mut ticks = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    () = token.cancelled() => return,
                    _ = ticks.tick() => {
                        let idle = inner.last_active.lock().elapsed();
                        if idle > inner.config.expiry_window {
                            error!(
                                identity = %inner.identity,
                                idle_ms = idle.as_millis() as u64,
                                "no traffic from registry, rejoining"
                            );
                            inner.rejoin().await;
                            return;
                        }
                        let ping = Ping {
                            identity: inner.identity.as_str().to_owned(),
                            timestamp: tick_ms(),
                        };
                        if let Err(e) = inner.publish_message(&ping).await {
                            warn!(error = %e, "failed to publish heartbeat");
                        }
                    }
                }
            }
        });
    }

    /// Tear down the dedicated channel and run a fresh handshake. The old
    /// session is abandoned, not resumed; the registry will hand out a new
    /// channel or re-confirm the old one, its call.
    async fn rejoin(self: &Arc<Self>) {
        self.cancel_heartbeat();

        let channel_sub = self.channel_sub.lock().take();
        if let Some((channel, id)) = channel_sub
            && let Err(e) = self.bus.unsubscribe(channel.as_str(), Some(id)).await
        {
            warn!(error = %e, channel = %channel, "failed to unsubscribe dedicated channel");
        }

        if let Err(e) = self.join().await {
            error!(error = %e, "rejoin failed; worker is unreachable until restarted");
        }
    }

    fn cancel_join(&self) {
        if let Some(token) = self.join_cancel.lock().take() {
            token.cancel();
        }
    }

    fn cancel_heartbeat(&self) {
        if let Some(token) = self.heartbeat_cancel.lock().take() {
            token.cancel();
        }
    }

    fn note_activity(&self) {
        *self.last_active.lock() = Instant::now();
    }

    async fn publish_join_request(&self) -> Result<(), ClientError> {
        let request = JoinRequest {
            identity: self.identity.as_str().to_owned(),
            worker_kind: self.config.kind,
        };
        self.publish_message(&request).await
    }

    async fn publish_message<M: WireMessage>(&self, message: &M) -> Result<(), ClientError> {
        let frame = encode_frame(&encode(message).to_wire());
        self.bus.publish(self.allocator.as_str(), frame).await?;
        Ok(())
    }

    /// Delivery callback with its own frame decoder; every delivery, of any
    /// type, refreshes the last-active watermark before dispatch.
    fn delivery_callback(self: &Arc<Self>) -> BusCallback {
        let inner = self.clone();
        let decoder = Arc::new(AsyncMutex::new(FrameDecoder::new()));
        callback(move |payload| {
            let inner = inner.clone();
            let decoder = decoder.clone();
            async move {
                inner.note_activity();
                let frames = decoder.lock().await.feed(&payload);
                let tx = inner.inbound_tx.lock().clone();
                if let Some(tx) = tx {
                    for frame in frames {
                        let _ = tx.send(frame);
                    }
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

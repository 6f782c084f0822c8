//! End-to-end session lifecycle over the in-process bus: a real registry
//! server and real clients, with the clock paused so every timer fires on
//! command.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use muster_bus::MemoryBus;
use muster_client::{ClientConfig, ClientState, SessionClient, SessionHooks};
use muster_core::{ChannelName, WorkerId};
use muster_protocol::WorkerKind;
use muster_server::{PresenceHooks, RegistryConfig, RegistryServer, WorkerSession};

async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}

fn make_client(bus: &Arc<MemoryBus>, identity: &str) -> SessionClient {
    SessionClient::with_identity(
        bus.clone(),
        ClientConfig::default(),
        WorkerId::from(identity),
    )
}

async fn started_server(bus: &Arc<MemoryBus>) -> RegistryServer {
    let server = RegistryServer::new(bus.clone(), RegistryConfig::default());
    server.serve().await.unwrap();
    server
}

#[derive(Default)]
struct Presence {
    joined: Mutex<Vec<String>>,
    left: Mutex<Vec<String>>,
}

#[async_trait]
impl PresenceHooks for Presence {
    async fn on_worker_joined(&self, session: &WorkerSession) {
        self.joined.lock().push(session.identity.to_string());
    }
    async fn on_worker_left(&self, session: &WorkerSession) {
        self.left.lock().push(session.identity.to_string());
    }
}

#[derive(Default)]
struct Ready {
    channels: Mutex<Vec<String>>,
}

#[async_trait]
impl SessionHooks for Ready {
    async fn on_ready(&self, channel: &ChannelName) {
        self.channels.lock().push(channel.to_string());
    }
}

#[tokio::test(start_paused = true)]
async fn worker_joins_and_stays_alive_through_heartbeats() {
    let bus = Arc::new(MemoryBus::new());
    let server = started_server(&bus).await;

    let client = make_client(&bus, "trader-1");
    client.start().await.unwrap();
    settle().await;

    assert_eq!(client.state(), ClientState::Active);
    assert_eq!(client.channel().unwrap().as_str(), "ib:clt:0");
    assert_eq!(server.worker_count().await, 1);

    // Several expiry windows pass; heartbeats keep the session registered
    // and every pong keeps the client active.
    for _ in 0..6 {
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
    }

    assert_eq!(client.state(), ClientState::Active);
    assert_eq!(server.worker_count().await, 1);
    assert!(client.rtt_ms().is_some(), "pongs should have measured rtt");

    client.close().await.unwrap();
    server.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn second_worker_gets_the_next_monotonic_channel() {
    let bus = Arc::new(MemoryBus::new());
    let server = started_server(&bus).await;

    let first = make_client(&bus, "trader-1");
    first.start().await.unwrap();
    settle().await;

    let second = SessionClient::with_identity(
        bus.clone(),
        ClientConfig::from_settings(&muster_settings::Settings::default(), WorkerKind::Recorder),
        WorkerId::from("recorder-1"),
    );
    second.start().await.unwrap();
    settle().await;

    assert_eq!(first.channel().unwrap().as_str(), "ib:clt:0");
    assert_eq!(second.channel().unwrap().as_str(), "ib:clt:1");
    assert_eq!(server.worker_count().await, 2);

    let kinds: Vec<WorkerKind> = server
        .sessions()
        .await
        .into_iter()
        .map(|session| session.kind)
        .collect();
    assert!(kinds.contains(&WorkerKind::Console));
    assert!(kinds.contains(&WorkerKind::Recorder));
}

#[tokio::test(start_paused = true)]
async fn presence_hooks_fire_on_join_and_eviction() {
    let bus = Arc::new(MemoryBus::new());
    let server = RegistryServer::new(bus.clone(), RegistryConfig::default());
    let presence = Arc::new(Presence::default());
    server.add_hooks(presence.clone());
    server.serve().await.unwrap();

    let client = make_client(&bus, "console-1");
    client.start().await.unwrap();
    settle().await;
    assert_eq!(presence.joined.lock().clone(), vec!["console-1".to_owned()]);

    // Kill the worker without a goodbye; the sweep notices the silence.
    client.close().await.unwrap();
    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
    }

    assert_eq!(server.worker_count().await, 0);
    assert_eq!(presence.left.lock().clone(), vec!["console-1".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn client_heals_itself_when_the_registry_disappears() {
    let bus = Arc::new(MemoryBus::new());
    let server = started_server(&bus).await;

    let ready = Arc::new(Ready::default());
    let client = make_client(&bus, "trader-1");
    client.add_hooks(ready.clone());
    client.start().await.unwrap();
    settle().await;
    assert_eq!(client.channel().unwrap().as_str(), "ib:clt:0");

    // Registry vanishes: no more pongs, nothing on the allocator channel.
    server.shutdown().await.unwrap();
    for _ in 0..4 {
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
    }

    // The client noticed the silence, dropped its dedicated channel, and is
    // handshaking again.
    assert_eq!(client.state(), ClientState::Joining);
    assert_eq!(bus.subscriber_count("ib:clt:0").await, 0);

    // A replacement registry comes up and the client completes the fresh
    // handshake on its own; retries were running the whole outage.
    let replacement = started_server(&bus).await;
    for _ in 0..3 {
        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
    }

    assert_eq!(client.state(), ClientState::Active);
    assert_eq!(client.channel().unwrap().as_str(), "ib:clt:0");
    assert_eq!(replacement.worker_count().await, 1);
    // Ready fired once per successful handshake.
    assert_eq!(ready.channels.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn same_identity_rejoin_is_idempotent_on_the_server() {
    let bus = Arc::new(MemoryBus::new());
    let server = started_server(&bus).await;

    let client = make_client(&bus, "trader-1");
    client.start().await.unwrap();
    settle().await;
    let first_channel = client.channel().unwrap();

    // A second client with the same identity (a duplicated deploy) joins:
    // the registry re-confirms the existing session instead of splitting it.
    let twin = make_client(&bus, "trader-1");
    twin.start().await.unwrap();
    settle().await;

    assert_eq!(server.worker_count().await, 1);
    assert_eq!(twin.channel().unwrap(), first_channel);
}

#[tokio::test(start_paused = true)]
async fn pushed_commands_reach_the_addressed_worker() {
    use muster_protocol::CommandResponse;

    let bus = Arc::new(MemoryBus::new());
    let server = started_server(&bus).await;

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = make_client(&bus, "console-1");
    client.add_handler::<CommandResponse, _, _>(move |response: CommandResponse| {
        let sink = sink.clone();
        async move {
            sink.lock().push(response.output);
        }
    });
    client.start().await.unwrap();

    let other = make_client(&bus, "console-2");
    other.start().await.unwrap();
    settle().await;

    let delivered = server
        .send_to_worker(
            &WorkerId::from("console-1"),
            &CommandResponse {
                status: 0,
                output: "2 open orders".into(),
            },
        )
        .await
        .unwrap();
    settle().await;

    assert!(delivered);
    assert_eq!(*seen.lock(), vec!["2 open orders".to_owned()]);
}

//! Typed message records and the generic encode/decode routines.
//!
//! Each message type is a plain record plus a static field descriptor table;
//! [`encode`] and [`decode`] are the only routines that walk those tables.
//! Encoding omits fields whose value is empty for their kind; decoding
//! restores omitted fields from the type's `Default`. The asymmetry is
//! deliberate and keeps steady-state payloads (heartbeats above all) small.

use crate::envelope::Envelope;
use crate::fields::{FieldKind, FieldSpec, FieldValue, coerce};

/// A record that can travel the bus as a tagged envelope.
pub trait WireMessage: Default {
    /// Numeric type tag, unique within a dispatcher.
    const URI: u32;
    /// Field descriptor table, in wire order.
    const FIELDS: &'static [FieldSpec];

    /// Current value of a declared field.
    fn get(&self, name: &str) -> FieldValue;

    /// Store a coerced value into a declared field.
    ///
    /// Values arrive already matching the declared kind; unknown names and
    /// mismatched kinds are ignored.
    fn set(&mut self, name: &str, value: FieldValue);
}

/// Encode a message into an envelope, omitting empty fields.
#[must_use]
pub fn encode<M: WireMessage>(message: &M) -> Envelope {
    let mut envelope = Envelope::new(M::URI);
    for spec in M::FIELDS {
        let value = message.get(spec.name);
        if !value.is_empty() {
            let _ = envelope.fields.insert(spec.name.to_owned(), value.to_json());
        }
    }
    envelope
}

/// Decode an envelope into a message, falling back to defaults.
///
/// Fields absent from the wire, or carrying values that cannot be coerced
/// into the declared kind, keep the type's default. The envelope's own tag
/// is not checked here; the dispatcher routes by tag before decoding.
#[must_use]
pub fn decode<M: WireMessage>(envelope: &Envelope) -> M {
    let mut message = M::default();
    for spec in M::FIELDS {
        if let Some(raw) = envelope.field(spec.name)
            && let Some(value) = coerce(spec.kind, raw)
        {
            message.set(spec.name, value);
        }
    }
    message
}

// ─────────────────────────────────────────────────────────────────────────────
// Enums carried as integer fields
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of worker joining the bus. Open-ended: unrecognized kinds are
/// preserved rather than rejected so old registries tolerate new workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorkerKind {
    /// Interactive console operator.
    #[default]
    Console,
    /// Automated trading service.
    Trader,
    /// Market/account recorder.
    Recorder,
    /// A kind this build does not know about.
    Other(i64),
}

impl WorkerKind {
    /// Wire representation.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Console => 0,
            Self::Trader => 1,
            Self::Recorder => 2,
            Self::Other(n) => n,
        }
    }

    /// Parse the wire representation.
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        match n {
            0 => Self::Console,
            1 => Self::Trader,
            2 => Self::Recorder,
            other => Self::Other(other),
        }
    }

    /// Human-readable label for logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Console => "console worker",
            Self::Trader => "trader worker",
            Self::Recorder => "recorder worker",
            Self::Other(_) => "unknown worker",
        }
    }
}

/// Outcome of a join request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JoinStatus {
    /// A fresh session was created.
    #[default]
    Success,
    /// The identity already holds a session; its channel is re-confirmed.
    Already,
    /// The request was rejected.
    Failed,
}

impl JoinStatus {
    /// Wire representation.
    #[must_use]
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Success => 0,
            Self::Already => 1,
            Self::Failed => 2,
        }
    }

    /// Parse the wire representation; unrecognized values read as `Failed`.
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        match n {
            0 => Self::Success,
            1 => Self::Already,
            _ => Self::Failed,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Message types
// ─────────────────────────────────────────────────────────────────────────────

/// Worker asks the registry for a dedicated channel. Tag 1.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinRequest {
    /// Identity of the joining worker.
    pub identity: String,
    /// What kind of worker is joining.
    pub worker_kind: WorkerKind,
}

impl WireMessage for JoinRequest {
    const URI: u32 = 1;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("identity", FieldKind::Str),
        FieldSpec::new("workerKind", FieldKind::Int),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "identity" => FieldValue::Str(self.identity.clone()),
            _ => FieldValue::Int(self.worker_kind.as_i64()),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("identity", FieldValue::Str(s)) => self.identity = s,
            ("workerKind", FieldValue::Int(n)) => self.worker_kind = WorkerKind::from_i64(n),
            _ => {}
        }
    }
}

/// Registry answers a join request on the allocator channel. Tag 2.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinResponse {
    /// Identity the response addresses; other workers ignore it.
    pub identity: String,
    /// Assigned dedicated channel, empty on failure.
    pub channel: String,
    /// Outcome of the request.
    pub status: JoinStatus,
}

impl WireMessage for JoinResponse {
    const URI: u32 = 2;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("identity", FieldKind::Str),
        FieldSpec::new("channel", FieldKind::Str),
        FieldSpec::new("status", FieldKind::Int),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "identity" => FieldValue::Str(self.identity.clone()),
            "channel" => FieldValue::Str(self.channel.clone()),
            _ => FieldValue::Int(self.status.as_i64()),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("identity", FieldValue::Str(s)) => self.identity = s,
            ("channel", FieldValue::Str(s)) => self.channel = s,
            ("status", FieldValue::Int(n)) => self.status = JoinStatus::from_i64(n),
            _ => {}
        }
    }
}

/// Worker heartbeat. Tag 3.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ping {
    /// Identity of the heartbeating worker.
    pub identity: String,
    /// Sender's wall clock in epoch milliseconds, echoed back in the pong.
    pub timestamp: i64,
}

impl WireMessage for Ping {
    const URI: u32 = 3;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("identity", FieldKind::Str),
        FieldSpec::new("timestamp", FieldKind::Int),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "identity" => FieldValue::Str(self.identity.clone()),
            _ => FieldValue::Int(self.timestamp),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("identity", FieldValue::Str(s)) => self.identity = s,
            ("timestamp", FieldValue::Int(n)) => self.timestamp = n,
            _ => {}
        }
    }
}

/// Registry heartbeat answer; the sender computes round-trip time from the
/// echoed timestamp. Tag 4.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pong {
    /// The ping's timestamp, unchanged.
    pub echoed_timestamp: i64,
}

impl WireMessage for Pong {
    const URI: u32 = 4;
    const FIELDS: &'static [FieldSpec] = &[FieldSpec::new("echoedTimestamp", FieldKind::Int)];

    fn get(&self, _name: &str) -> FieldValue {
        FieldValue::Int(self.echoed_timestamp)
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        if let ("echoedTimestamp", FieldValue::Int(n)) = (name, value) {
            self.echoed_timestamp = n;
        }
    }
}

/// One console command addressed to the registry side. Tag 5.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandRequest {
    /// Identity of the requesting worker.
    pub identity: String,
    /// Command line to execute.
    pub command: String,
}

impl WireMessage for CommandRequest {
    const URI: u32 = 5;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("identity", FieldKind::Str),
        FieldSpec::new("command", FieldKind::Str),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "identity" => FieldValue::Str(self.identity.clone()),
            _ => FieldValue::Str(self.command.clone()),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("identity", FieldValue::Str(s)) => self.identity = s,
            ("command", FieldValue::Str(s)) => self.command = s,
            _ => {}
        }
    }
}

/// Result of a console command, pushed on the worker's dedicated channel.
/// Tag 6.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandResponse {
    /// Zero on success, command-specific otherwise.
    pub status: i64,
    /// Human-readable output.
    pub output: String,
}

impl WireMessage for CommandResponse {
    const URI: u32 = 6;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("status", FieldKind::Int),
        FieldSpec::new("output", FieldKind::Str),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "status" => FieldValue::Int(self.status),
            _ => FieldValue::Str(self.output.clone()),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("status", FieldValue::Int(n)) => self.status = n,
            ("output", FieldValue::Str(s)) => self.output = s,
            _ => {}
        }
    }
}

/// One top-of-book snapshot fanned out to data subscribers. Tag 7.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MarketData {
    /// Instrument alias.
    pub symbol: String,
    /// Snapshot time in epoch milliseconds.
    pub timestamp: i64,
    /// Bid price ladder, best first.
    pub bid_prices: Vec<f64>,
    /// Bid size ladder, aligned with `bid_prices`.
    pub bid_sizes: Vec<f64>,
    /// Ask price ladder, best first.
    pub ask_prices: Vec<f64>,
    /// Ask size ladder, aligned with `ask_prices`.
    pub ask_sizes: Vec<f64>,
}

impl WireMessage for MarketData {
    const URI: u32 = 7;
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("symbol", FieldKind::Str),
        FieldSpec::new("timestamp", FieldKind::Int),
        FieldSpec::new("bidPrices", FieldKind::FloatList),
        FieldSpec::new("bidSizes", FieldKind::FloatList),
        FieldSpec::new("askPrices", FieldKind::FloatList),
        FieldSpec::new("askSizes", FieldKind::FloatList),
    ];

    fn get(&self, name: &str) -> FieldValue {
        match name {
            "symbol" => FieldValue::Str(self.symbol.clone()),
            "timestamp" => FieldValue::Int(self.timestamp),
            "bidPrices" => FieldValue::FloatList(self.bid_prices.clone()),
            "bidSizes" => FieldValue::FloatList(self.bid_sizes.clone()),
            "askPrices" => FieldValue::FloatList(self.ask_prices.clone()),
            _ => FieldValue::FloatList(self.ask_sizes.clone()),
        }
    }

    fn set(&mut self, name: &str, value: FieldValue) {
        match (name, value) {
            ("symbol", FieldValue::Str(s)) => self.symbol = s,
            ("timestamp", FieldValue::Int(n)) => self.timestamp = n,
            ("bidPrices", FieldValue::FloatList(v)) => self.bid_prices = v,
            ("bidSizes", FieldValue::FloatList(v)) => self.bid_sizes = v,
            ("askPrices", FieldValue::FloatList(v)) => self.ask_prices = v,
            ("askSizes", FieldValue::FloatList(v)) => self.ask_sizes = v,
            _ => {}
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

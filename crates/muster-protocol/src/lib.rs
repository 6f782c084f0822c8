//! # muster-protocol
//!
//! The wire layer of the muster command bus:
//!
//! - **Framing**: length-prefixed packing of UTF-8 payloads over an
//!   arbitrarily-chunked byte stream ([`framing`])
//! - **Envelope**: the tagged key/value form of one wire message ([`envelope`])
//! - **Fields**: per-type field descriptor tables with typed-default
//!   coercion ([`fields`])
//! - **Messages**: the concrete message types and the generic
//!   encode/decode routines ([`messages`])
//! - **Dispatch**: tag-to-handler routing with strictly sequential
//!   handler execution ([`dispatcher`])

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod envelope;
pub mod fields;
pub mod framing;
pub mod messages;

pub use dispatcher::Dispatcher;
pub use envelope::Envelope;
pub use fields::{FieldKind, FieldSpec, FieldValue};
pub use framing::{FrameDecoder, encode_frame};
pub use messages::{
    CommandRequest, CommandResponse, JoinRequest, JoinResponse, JoinStatus, MarketData, Ping, Pong,
    WireMessage, WorkerKind, decode, encode,
};

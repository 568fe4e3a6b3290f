//! Payload codec seam and the JSON reference codec.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Message type reserved for load-balancer health probes.
pub const L4_PROBE_KIND: &str = "l4-probe";

/// Errors raised while converting between payload bytes and messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The payload could not be decoded.
    #[error("failed to decode payload: {message}")]
    Decode {
        /// Decoder diagnostic.
        message: String,
    },
    /// A message could not be encoded.
    #[error("failed to encode message: {message}")]
    Encode {
        /// Encoder diagnostic.
        message: String,
    },
}

impl CodecError {
    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::Encode {
            message: message.into(),
        }
    }
}

/// Converts payload bytes to structured messages and back.
///
/// Implementations are shared by every dispatch worker, so each call must be
/// self-contained: no mutable decode or encode state may survive between
/// calls.
pub trait Codec: Send + Sync + 'static {
    /// Structured message type.
    type Message: Send + 'static;

    /// Decodes one payload.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Message, CodecError>;

    /// Encodes one message.
    fn encode(&self, message: &Self::Message) -> Result<Vec<u8>, CodecError>;

    /// Describes `message` when it is a transport probe rather than
    /// application traffic.
    fn transport_probe(&self, _message: &Self::Message) -> Option<String> {
        None
    }
}

/// JSON message with a type tag and an opaque body.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Envelope {
    /// Message type tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Message body.
    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    /// Builds an envelope.
    #[must_use]
    pub fn new(kind: impl Into<String>, body: Value) -> Self {
        Self {
            kind: kind.into(),
            body,
        }
    }

    /// Whether this envelope is a load-balancer probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.kind == L4_PROBE_KIND
    }
}

/// Stateless codec reading and writing [`Envelope`] JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Message = Envelope;

    fn decode(&self, bytes: &[u8]) -> Result<Envelope, CodecError> {
        serde_json::from_slice(bytes).map_err(|error| CodecError::decode(error.to_string()))
    }

    fn encode(&self, message: &Envelope) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(message).map_err(|error| CodecError::encode(error.to_string()))
    }

    fn transport_probe(&self, message: &Envelope) -> Option<String> {
        message.is_probe().then(|| message.body.to_string())
    }
}

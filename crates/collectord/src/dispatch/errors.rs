//! Error types for the dispatch paths.
//!
//! None of these errors leave the receiver. They exist so each failure mode
//! is logged with its own context before the message is dropped.

use std::error::Error as StdError;

use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Failure reported by a business dispatch handler.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl HandlerError {
    /// Creates an error from a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Diagnostic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised while moving one message through a dispatch path.
///
/// Each variant names the failing stage; the cause is reachable through
/// [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The payload could not be decoded.
    #[error("decode failed")]
    Decode(#[source] CodecError),

    /// The business handler failed.
    #[error("handler failed")]
    Handler(#[source] HandlerError),

    /// The handler's result could not be encoded.
    #[error("encode failed")]
    Encode(#[source] CodecError),

    /// The encoded result could not be written back to the agent.
    #[error("reply failed")]
    Reply(#[source] TransportError),

    /// The handler or codec panicked.
    #[error("dispatch panicked: {message}")]
    Panicked {
        /// Rendered panic payload.
        message: String,
    },
}

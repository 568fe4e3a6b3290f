//! Dispatch paths from raw payloads to business handlers.
//!
//! A [`Dispatcher`] pairs a [`Codec`] with a [`DispatchHandler`] and runs on
//! the receiver's worker threads. It offers two entry points:
//!
//! - [`Dispatcher::handle_send`] decodes a one-way payload and forwards it.
//! - [`Dispatcher::handle_request`] decodes a request, invokes the handler and
//!   writes any result back through the request's reply handle.
//!
//! Every failure, including a panic inside the codec or handler, ends in a
//! `warn` record carrying the remote address. When debug logging is enabled
//! for this module a hex dump of the offending payload follows. Failed
//! requests never produce a reply: the agent treats a missing response as
//! the error signal.

mod errors;

use std::error::Error as StdError;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{Level, debug, warn};

use crate::codec::Codec;
use crate::pool::panic_message;
use crate::transport::{ReplyHandle, RequestPacket, SendPacket};

pub use self::errors::{DispatchError, HandlerError};

const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

/// Business logic receiving decoded messages.
///
/// Called concurrently from every worker thread.
pub trait DispatchHandler<M>: Send + Sync + 'static {
    /// Handles a one-way message.
    fn dispatch_send(&self, message: M) -> Result<(), HandlerError>;

    /// Handles a request. `Ok(None)` means the request has no response.
    fn dispatch_request(&self, message: M) -> Result<Option<M>, HandlerError>;
}

impl<M, T> DispatchHandler<M> for Arc<T>
where
    T: DispatchHandler<M> + ?Sized,
{
    fn dispatch_send(&self, message: M) -> Result<(), HandlerError> {
        self.as_ref().dispatch_send(message)
    }

    fn dispatch_request(&self, message: M) -> Result<Option<M>, HandlerError> {
        self.as_ref().dispatch_request(message)
    }
}

/// How a request left the dispatch path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RequestOutcome {
    /// The handler's result was written back.
    Replied,
    /// The handler produced no result.
    NoResult,
    /// The message was a transport probe and was dropped.
    Probe(String),
}

/// Codec and handler shared by the receiver's workers.
#[derive(Debug)]
pub struct Dispatcher<C, D> {
    codec: C,
    handler: D,
}

impl<C, D> Dispatcher<C, D>
where
    C: Codec,
    D: DispatchHandler<C::Message>,
{
    /// Pairs `codec` with `handler`.
    pub fn new(codec: C, handler: D) -> Self {
        Self { codec, handler }
    }

    /// Decodes and forwards one fire-and-forget payload. Never fails.
    pub fn handle_send(&self, packet: SendPacket) {
        let (payload, remote) = packet.into_parts();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.process_send(&payload)))
            .unwrap_or_else(|panic| {
                Err(DispatchError::Panicked {
                    message: panic_message(panic.as_ref()),
                })
            });
        if let Err(error) = result {
            log_failure("send", &error, remote, &payload);
        }
    }

    /// Decodes, handles and answers one request. Never fails; on any error
    /// the request goes unanswered.
    pub fn handle_request(&self, packet: RequestPacket) {
        let remote = packet.remote_addr();
        let (payload, reply) = packet.into_parts();
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| self.process_request(&payload, reply)))
                .unwrap_or_else(|panic| {
                    Err(DispatchError::Panicked {
                        message: panic_message(panic.as_ref()),
                    })
                });
        match result {
            Ok(RequestOutcome::Probe(probe)) => {
                debug!(
                    target: DISPATCH_TARGET,
                    %remote,
                    %probe,
                    "dropped transport probe request"
                );
            }
            Ok(_) => {}
            Err(error) => log_failure("request", &error, remote, &payload),
        }
    }

    fn process_send(&self, payload: &[u8]) -> Result<(), DispatchError> {
        let message = self.codec.decode(payload).map_err(DispatchError::Decode)?;
        self.handler
            .dispatch_send(message)
            .map_err(DispatchError::Handler)
    }

    fn process_request(
        &self,
        payload: &[u8],
        reply: Box<dyn ReplyHandle>,
    ) -> Result<RequestOutcome, DispatchError> {
        let message = self.codec.decode(payload).map_err(DispatchError::Decode)?;
        if let Some(probe) = self.codec.transport_probe(&message) {
            return Ok(RequestOutcome::Probe(probe));
        }
        let Some(response) = self
            .handler
            .dispatch_request(message)
            .map_err(DispatchError::Handler)?
        else {
            return Ok(RequestOutcome::NoResult);
        };
        let bytes = self
            .codec
            .encode(&response)
            .map_err(DispatchError::Encode)?;
        reply.reply(bytes).map_err(DispatchError::Reply)?;
        Ok(RequestOutcome::Replied)
    }
}

fn log_failure(path: &'static str, error: &DispatchError, remote: SocketAddr, payload: &[u8]) {
    let cause = StdError::source(error).map(ToString::to_string);
    warn!(
        target: DISPATCH_TARGET,
        path,
        %remote,
        %error,
        cause = cause.as_deref(),
        "dropping message"
    );
    if tracing::enabled!(target: DISPATCH_TARGET, Level::DEBUG) {
        debug!(
            target: DISPATCH_TARGET,
            path,
            %remote,
            len = payload.len(),
            payload = %hex::encode(payload),
            "dropped payload"
        );
    }
}

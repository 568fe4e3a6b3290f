//! Business handler and reply doubles.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};

use crate::codec::Envelope;
use crate::dispatch::{DispatchHandler, HandlerError};
use crate::transport::{ReplyHandle, TransportError};

/// Encodes `envelope` as the JSON payload an agent would send.
pub fn envelope_bytes(envelope: &Envelope) -> Vec<u8> {
    serde_json::to_vec(envelope).expect("encode envelope")
}

#[derive(Default)]
struct HandlerState {
    sends: Vec<Envelope>,
    requests: Vec<Envelope>,
    response: Option<Envelope>,
    failure: Option<String>,
}

/// Handler recording every message, optionally blocking until released.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    state: Arc<Mutex<HandlerState>>,
    started: Option<Sender<()>>,
    release: Option<Receiver<()>>,
    delay: Option<Duration>,
}

impl RecordingHandler {
    /// Answers every request with `response`.
    #[must_use]
    pub fn responding(self, response: Envelope) -> Self {
        self.lock().response = Some(response);
        self
    }

    /// Fails every call with `message`.
    #[must_use]
    pub fn failing(self, message: &str) -> Self {
        self.lock().failure = Some(message.to_owned());
        self
    }

    /// Reports each call on `started`, then blocks until `release` yields or
    /// disconnects.
    #[must_use]
    pub fn blocking(mut self, started: Sender<()>, release: Receiver<()>) -> Self {
        self.started = Some(started);
        self.release = Some(release);
        self
    }

    /// Sleeps for `delay` on each call.
    #[must_use]
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Messages received through the one-way path.
    pub fn sends(&self) -> Vec<Envelope> {
        self.lock().sends.clone()
    }

    /// Messages received through the request path.
    pub fn requests(&self) -> Vec<Envelope> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandlerState> {
        self.state.lock().expect("handler state mutex poisoned")
    }

    fn pause(&self) {
        if let Some(started) = &self.started {
            let _ = started.send(());
        }
        if let Some(release) = &self.release {
            let _ = release.recv();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
    }

    fn failure(&self) -> Option<HandlerError> {
        self.lock().failure.as_deref().map(HandlerError::new)
    }
}

impl DispatchHandler<Envelope> for RecordingHandler {
    fn dispatch_send(&self, message: Envelope) -> Result<(), HandlerError> {
        self.pause();
        self.lock().sends.push(message);
        self.failure().map_or(Ok(()), Err)
    }

    fn dispatch_request(&self, message: Envelope) -> Result<Option<Envelope>, HandlerError> {
        self.pause();
        self.lock().requests.push(message);
        if let Some(error) = self.failure() {
            return Err(error);
        }
        Ok(self.lock().response.clone())
    }
}

/// Reply handle recording every payload written through it.
#[derive(Clone)]
pub struct RecordingReply {
    remote: SocketAddr,
    replies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingReply {
    /// Builds a handle bound to a fixed agent address.
    pub fn new() -> Self {
        Self {
            remote: SocketAddr::from(([10, 0, 0, 7], 41_000)),
            replies: Arc::default(),
        }
    }

    /// Payloads written so far.
    pub fn replies(&self) -> Vec<Vec<u8>> {
        self.replies.lock().expect("reply mutex poisoned").clone()
    }
}

impl Default for RecordingReply {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyHandle for RecordingReply {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn reply(self: Box<Self>, payload: Vec<u8>) -> Result<(), TransportError> {
        self.replies
            .lock()
            .expect("reply mutex poisoned")
            .push(payload);
        Ok(())
    }
}

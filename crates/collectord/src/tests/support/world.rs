//! Scenario world driving a receiver through its message listener.

use std::cell::RefCell;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use collector_config::Config;

use crate::codec::{Envelope, JsonCodec};
use crate::pool::PoolError;
use crate::receiver::{Collaborators, ShutdownOutcome, TcpReceiver};
use crate::transport::{MessageListener, PingPacket, RequestPacket, SendPacket};

use super::{
    RecordingHandler, RecordingHealthReporter, RecordingReply, RecordingSink, StubAcceptor,
    StubPeer, envelope_bytes, test_config,
};

const AGENT: ([u8; 4], u16) = ([10, 0, 0, 7], 41_000);

/// Receiver plus the doubles observing it.
pub struct ReceiverWorld {
    pub handler: RecordingHandler,
    pub sink: Arc<RecordingSink>,
    pub acceptor: Arc<StubAcceptor>,
    pub reporter: Arc<RecordingHealthReporter>,
    pub reply: RecordingReply,
    pub config: Config,
    pub drain_timeout: Option<Duration>,
    receiver: Option<TcpReceiver<JsonCodec, RecordingHandler>>,
    pub outcomes: Vec<ShutdownOutcome>,
    pub stop_elapsed: Option<Duration>,
    pub submit_result: Option<Result<(), PoolError>>,
}

impl ReceiverWorld {
    /// Builds a world with default doubles and the test configuration.
    pub fn new() -> Self {
        Self {
            handler: RecordingHandler::default(),
            sink: Arc::new(RecordingSink::default()),
            acceptor: Arc::new(StubAcceptor::default()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            reply: RecordingReply::new(),
            config: test_config(),
            drain_timeout: None,
            receiver: None,
            outcomes: Vec::new(),
            stop_elapsed: None,
            submit_result: None,
        }
    }

    /// Builds and starts the receiver with the current doubles.
    pub fn start(&mut self) {
        let receiver = TcpReceiver::new(
            &self.config,
            Collaborators {
                codec: JsonCodec,
                handler: self.handler.clone(),
                lifecycle: self.sink.clone(),
                acceptor: self.acceptor.clone(),
                cluster: None,
            },
        )
        .expect("build receiver")
        .with_reporter(self.reporter.clone());
        let receiver = match self.drain_timeout {
            Some(timeout) => receiver.with_drain_timeout(timeout),
            None => receiver,
        };
        receiver.start().expect("start receiver");
        self.receiver = Some(receiver);
    }

    fn receiver(&self) -> &TcpReceiver<JsonCodec, RecordingHandler> {
        self.receiver
            .as_ref()
            .expect("receiver should be started first")
    }

    fn listener(&self) -> Arc<dyn MessageListener> {
        self.receiver().message_listener()
    }

    /// Delivers a one-way payload.
    pub fn send(&self, payload: Vec<u8>) {
        self.listener()
            .handle_send(SendPacket::new(payload, SocketAddr::from(AGENT)));
    }

    /// Delivers a one-way message.
    pub fn send_message(&self, message: &Envelope) {
        self.send(envelope_bytes(message));
    }

    /// Delivers a request answered through [`ReceiverWorld::reply`].
    pub fn request(&self, payload: Vec<u8>) {
        self.listener()
            .handle_request(RequestPacket::new(payload, Box::new(self.reply.clone())));
    }

    /// Delivers a ping.
    pub fn ping(&self, sequence: i32) {
        self.listener()
            .handle_ping(PingPacket::new(sequence), StubPeer::shared());
    }

    /// Stops the receiver, recording the outcome and how long it took.
    pub fn stop(&mut self) {
        let begun = Instant::now();
        let outcome = self.receiver().stop();
        self.stop_elapsed = Some(begun.elapsed());
        self.outcomes.push(outcome);
    }

    /// Tries to queue an empty task on the dispatch pool.
    pub fn submit_task(&mut self) {
        self.submit_result = Some(self.receiver().dispatch_pool().submit(|| {}));
    }
}

impl Default for ReceiverWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default receiver world fixture.
pub fn receiver_world() -> RefCell<ReceiverWorld> {
    RefCell::new(ReceiverWorld::new())
}

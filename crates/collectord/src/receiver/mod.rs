//! The collector's TCP receiver.
//!
//! [`TcpReceiver`] ties the pieces together. It registers a
//! [`MessageListener`] with the acceptor that gates handshakes, hands
//! one-way packets and requests to the bounded dispatch pool, and routes
//! pings to the liveness tracker on a separate executor. Transport threads
//! only ever validate and enqueue, so a slow business handler can saturate
//! the pool without stalling socket I/O.

mod probe;
mod shutdown;

use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use collector_config::{Config, ConfigError};

use crate::codec::Codec;
use crate::dispatch::{DispatchHandler, Dispatcher};
use crate::gate::{ConnectionGate, HandshakeDecision, HandshakeProperties};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::liveness::{LifecycleSink, LivenessTracker};
use crate::pool::{PoolError, WorkerPool};
use crate::transport::{
    ClusterService, MessageListener, PeerConnection, PingPacket, RequestPacket, SendPacket,
    ServerAcceptor, StateChangeHandler, TransportError,
};

pub use self::probe::{ResolveError, resolve_probe_addresses};
pub use self::shutdown::{DEFAULT_DRAIN_TIMEOUT, ShutdownCoordinator, ShutdownOutcome};

const RECEIVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::receiver");

/// Thread name prefix of the dispatch pool.
pub const WORKER_POOL_NAME: &str = "collector-tcp-worker";

/// Thread name prefix of the liveness executor.
pub const EVENT_POOL_NAME: &str = "collector-agent-event-worker";

/// Errors surfaced while building or starting the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// The configuration violates a sizing invariant.
    #[error("invalid receiver configuration: {0}")]
    Config(#[from] ConfigError),
    /// An executor could not be created.
    #[error("failed to build executor: {0}")]
    Pool(#[from] PoolError),
    /// The acceptor failed to bind.
    #[error("failed to bind receiver: {0}")]
    Bind(#[source] TransportError),
    /// `start` was called twice.
    #[error("receiver already started")]
    AlreadyStarted,
    /// `start` was called after `stop`.
    #[error("receiver has been stopped")]
    Stopped,
}

/// External collaborators the receiver drives.
pub struct Collaborators<C, D> {
    /// Payload codec shared by every worker.
    pub codec: C,
    /// Business dispatcher for decoded messages.
    pub handler: D,
    /// Destination for liveness updates.
    pub lifecycle: Arc<dyn LifecycleSink>,
    /// Connection acceptor.
    pub acceptor: Arc<dyn ServerAcceptor>,
    /// Optional cluster membership service.
    pub cluster: Option<Arc<dyn ClusterService>>,
}

/// Message-dispatch front end bound to a [`ServerAcceptor`].
pub struct TcpReceiver<C, D> {
    host: String,
    port: u16,
    probe_hosts: Vec<String>,
    acceptor: Arc<dyn ServerAcceptor>,
    listener: Arc<ReceiverListener<C, D>>,
    worker: Arc<WorkerPool>,
    event_worker: Option<Arc<WorkerPool>>,
    state_handlers: Vec<Arc<dyn StateChangeHandler>>,
    handlers_registered: Once,
    reporter: Arc<dyn HealthReporter>,
    drain_timeout: Duration,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl<C, D> TcpReceiver<C, D>
where
    C: Codec,
    D: DispatchHandler<C::Message>,
{
    /// Builds the receiver and its executors.
    ///
    /// An enabled cluster service has its state-change handler registered
    /// with the acceptor immediately.
    pub fn new(
        config: &Config,
        collaborators: Collaborators<C, D>,
    ) -> Result<Self, ReceiverError> {
        config.validate()?;
        let Collaborators {
            codec,
            handler,
            lifecycle,
            acceptor,
            cluster,
        } = collaborators;

        let worker = Arc::new(WorkerPool::new(
            WORKER_POOL_NAME,
            config.worker_threads(),
            config.worker_queue_size(),
        )?);
        let event_worker = match config.event_worker_threads() {
            0 => None,
            threads => {
                let pool = WorkerPool::new(
                    EVENT_POOL_NAME,
                    threads,
                    config.event_worker_queue_size(),
                )
                .inspect_err(|_| worker.shutdown())?;
                Some(Arc::new(pool))
            }
        };

        if let Some(cluster) = cluster.filter(|cluster| cluster.is_enabled()) {
            acceptor.add_state_change_handler(cluster.state_change_handler());
        }

        let listener = Arc::new(ReceiverListener {
            gate: ConnectionGate,
            dispatcher: Arc::new(Dispatcher::new(codec, handler)),
            worker: Arc::clone(&worker),
            liveness: LivenessTracker::new(lifecycle, event_worker.clone()),
        });

        Ok(Self {
            host: config.listen_ip().to_owned(),
            port: config.listen_port(),
            probe_hosts: config.l4_ip_list().to_vec(),
            acceptor,
            listener,
            worker,
            event_worker,
            state_handlers: Vec::new(),
            handlers_registered: Once::new(),
            reporter: Arc::new(StructuredHealthReporter::new()),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        })
    }

    /// Adds connection observers registered with the acceptor at start.
    #[must_use]
    pub fn with_state_change_handlers(
        mut self,
        handlers: impl IntoIterator<Item = Arc<dyn StateChangeHandler>>,
    ) -> Self {
        self.state_handlers.extend(handlers);
        self
    }

    /// Replaces the lifecycle reporter.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Overrides the per-executor drain grace period.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Wires the listener into the acceptor and binds it.
    ///
    /// A failed bind leaves the receiver unstarted, so `start` may be
    /// retried.
    pub fn start(&self) -> Result<(), ReceiverError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(ReceiverError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ReceiverError::AlreadyStarted);
        }
        self.reporter.receiver_starting(&self.host, self.port);

        self.handlers_registered.call_once(|| {
            for handler in &self.state_handlers {
                self.acceptor.add_state_change_handler(Arc::clone(handler));
            }
        });
        if !self.probe_hosts.is_empty() {
            match resolve_probe_addresses(&self.probe_hosts) {
                Ok(addresses) => {
                    debug!(target: RECEIVER_TARGET, ?addresses, "probe ignore list resolved");
                    self.acceptor.set_ignore_addresses(addresses);
                }
                Err(error) => self.reporter.probe_resolution_failed(&error),
            }
        }

        let listener: Arc<dyn MessageListener> = self.listener.clone();
        self.acceptor.set_message_listener(listener);
        if let Err(error) = self.acceptor.bind(&self.host, self.port) {
            self.started.store(false, Ordering::SeqCst);
            return Err(ReceiverError::Bind(error));
        }
        self.reporter.receiver_bound(&self.host, self.port);
        Ok(())
    }

    /// Closes the acceptor, then drains the executors.
    ///
    /// Safe to call repeatedly and before [`start`](Self::start); only the
    /// first call does any work.
    pub fn stop(&self) -> ShutdownOutcome {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return ShutdownOutcome::AlreadyStopped;
        }
        self.reporter.receiver_stopping();
        self.acceptor.close();

        let coordinator = ShutdownCoordinator::new(self.drain_timeout);
        let outcome = coordinator.shutdown(&[
            Some(self.worker.as_ref()),
            self.event_worker.as_deref(),
        ]);
        self.reporter.receiver_stopped(outcome);
        outcome
    }

    /// The dispatch pool.
    #[must_use]
    pub fn dispatch_pool(&self) -> &WorkerPool {
        &self.worker
    }

    /// The liveness executor, when configured.
    #[must_use]
    pub fn event_pool(&self) -> Option<&WorkerPool> {
        self.event_worker.as_deref()
    }

    /// Callbacks registered with the acceptor.
    #[must_use]
    pub fn message_listener(&self) -> Arc<dyn MessageListener> {
        self.listener.clone()
    }
}

/// Callbacks installed on the acceptor.
struct ReceiverListener<C, D> {
    gate: ConnectionGate,
    dispatcher: Arc<Dispatcher<C, D>>,
    worker: Arc<WorkerPool>,
    liveness: LivenessTracker,
}

impl<C, D> MessageListener for ReceiverListener<C, D>
where
    C: Codec,
    D: DispatchHandler<C::Message>,
{
    fn handle_handshake(&self, properties: Option<&HandshakeProperties>) -> HandshakeDecision {
        let decision = self.gate.decide(properties);
        debug!(
            target: RECEIVER_TARGET,
            agent_id = properties.and_then(HandshakeProperties::agent_id),
            ?decision,
            "handshake decided"
        );
        decision
    }

    fn handle_send(&self, packet: SendPacket) {
        let remote = packet.remote_addr();
        let dispatcher = Arc::clone(&self.dispatcher);
        if let Err(error) = self.worker.submit(move || dispatcher.handle_send(packet)) {
            warn!(target: RECEIVER_TARGET, %remote, "send packet dropped: {error}");
        }
    }

    fn handle_request(&self, packet: RequestPacket) {
        let remote = packet.remote_addr();
        let dispatcher = Arc::clone(&self.dispatcher);
        if let Err(error) = self.worker.submit(move || dispatcher.handle_request(packet)) {
            warn!(target: RECEIVER_TARGET, %remote, "request packet dropped: {error}");
        }
    }

    fn handle_ping(&self, packet: PingPacket, connection: Arc<dyn PeerConnection>) {
        self.liveness
            .record_ping(connection, packet.ping_id(), now_millis());
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

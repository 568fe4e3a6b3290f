//! Agent liveness tracking driven by keep-alive pings.
//!
//! Pings travel on their own executor, separate from the dispatch pool, so a
//! saturated work queue never delays liveness. A ping with a non-negative
//! sequence marks the agent as running before the ping event is emitted; a
//! negative sequence only emits the event.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::pool::{WorkerPool, panic_message};
use crate::transport::PeerConnection;

const LIVENESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::liveness");

/// Run states the collector records for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentLifecycleState {
    /// The agent is alive and sending traffic.
    Running,
    /// The agent announced an orderly shutdown.
    ShutDown,
    /// The agent disappeared without announcing it.
    UnexpectedShutdown,
}

/// Agent events emitted by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentEventKind {
    /// A keep-alive ping arrived.
    AgentPing,
}

/// Failure reported by a [`LifecycleSink`].
#[derive(Debug, Error)]
#[error("lifecycle update failed: {message}")]
pub struct LifecycleError {
    message: String,
}

impl LifecycleError {
    /// Creates an error from a diagnostic message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Destination for agent run-state transitions and events.
pub trait LifecycleSink: Send + Sync + 'static {
    /// Records that `connection`'s agent entered `state`.
    fn apply_run_state(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        state: AgentLifecycleState,
        sequence: i32,
    ) -> Result<(), LifecycleError>;

    /// Records an agent event.
    fn emit_event(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        kind: AgentEventKind,
    ) -> Result<(), LifecycleError>;
}

impl<T> LifecycleSink for Arc<T>
where
    T: LifecycleSink + ?Sized,
{
    fn apply_run_state(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        state: AgentLifecycleState,
        sequence: i32,
    ) -> Result<(), LifecycleError> {
        self.as_ref()
            .apply_run_state(connection, timestamp, state, sequence)
    }

    fn emit_event(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        kind: AgentEventKind,
    ) -> Result<(), LifecycleError> {
        self.as_ref().emit_event(connection, timestamp, kind)
    }
}

/// Applies pings to a [`LifecycleSink`], optionally on a dedicated executor.
pub struct LivenessTracker {
    sink: Arc<dyn LifecycleSink>,
    executor: Option<Arc<WorkerPool>>,
}

impl LivenessTracker {
    /// Builds a tracker. Without an executor pings are applied on the
    /// calling thread.
    pub fn new(sink: Arc<dyn LifecycleSink>, executor: Option<Arc<WorkerPool>>) -> Self {
        Self { sink, executor }
    }

    /// Records one ping from `connection`. Never fails.
    pub fn record_ping(&self, connection: Arc<dyn PeerConnection>, sequence: i32, timestamp: u64) {
        let sink = Arc::clone(&self.sink);
        let remote = connection.remote_addr();
        let task = move || apply_ping(sink.as_ref(), connection.as_ref(), sequence, timestamp);
        let Some(executor) = self.executor.as_ref() else {
            task();
            return;
        };
        if let Err(error) = executor.submit(task) {
            warn!(target: LIVENESS_TARGET, %remote, %error, "ping dropped");
        }
    }
}

fn apply_ping(
    sink: &dyn LifecycleSink,
    connection: &dyn PeerConnection,
    sequence: i32,
    timestamp: u64,
) {
    let remote = connection.remote_addr();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        ping_transitions(sink, connection, sequence, timestamp)
    }))
    .unwrap_or_else(|panic| Err(LifecycleError::new(panic_message(panic.as_ref()))));
    match result {
        Ok(()) => debug!(target: LIVENESS_TARGET, %remote, sequence, "ping recorded"),
        Err(error) => log_failure(remote, sequence, &error),
    }
}

fn ping_transitions(
    sink: &dyn LifecycleSink,
    connection: &dyn PeerConnection,
    sequence: i32,
    timestamp: u64,
) -> Result<(), LifecycleError> {
    if sequence >= 0 {
        sink.apply_run_state(connection, timestamp, AgentLifecycleState::Running, sequence)?;
    }
    sink.emit_event(connection, timestamp, AgentEventKind::AgentPing)
}

fn log_failure(remote: SocketAddr, sequence: i32, error: &LifecycleError) {
    warn!(
        target: LIVENESS_TARGET,
        %remote,
        sequence,
        %error,
        "failed to record ping"
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use rstest::rstest;

    use crate::gate::HandshakeProperties;

    use super::*;

    #[derive(Debug)]
    struct StubPeer;

    impl PeerConnection for StubPeer {
        fn remote_addr(&self) -> SocketAddr {
            SocketAddr::from(([10, 0, 0, 9], 5000))
        }

        fn properties(&self) -> Option<HandshakeProperties> {
            None
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Recorded {
        RunState(AgentLifecycleState, i32),
        Event(AgentEventKind),
    }

    #[derive(Default)]
    struct RecordingSink {
        records: Mutex<Vec<Recorded>>,
        fail_run_state: bool,
    }

    impl RecordingSink {
        fn records(&self) -> Vec<Recorded> {
            self.records.lock().expect("records lock").clone()
        }
    }

    impl LifecycleSink for RecordingSink {
        fn apply_run_state(
            &self,
            _connection: &dyn PeerConnection,
            _timestamp: u64,
            state: AgentLifecycleState,
            sequence: i32,
        ) -> Result<(), LifecycleError> {
            if self.fail_run_state {
                return Err(LifecycleError::new("store unavailable"));
            }
            self.records
                .lock()
                .expect("records lock")
                .push(Recorded::RunState(state, sequence));
            Ok(())
        }

        fn emit_event(
            &self,
            _connection: &dyn PeerConnection,
            _timestamp: u64,
            kind: AgentEventKind,
        ) -> Result<(), LifecycleError> {
            self.records
                .lock()
                .expect("records lock")
                .push(Recorded::Event(kind));
            Ok(())
        }
    }

    #[rstest]
    #[case::positive(5, vec![
        Recorded::RunState(AgentLifecycleState::Running, 5),
        Recorded::Event(AgentEventKind::AgentPing),
    ])]
    #[case::zero(0, vec![
        Recorded::RunState(AgentLifecycleState::Running, 0),
        Recorded::Event(AgentEventKind::AgentPing),
    ])]
    #[case::negative(-1, vec![Recorded::Event(AgentEventKind::AgentPing)])]
    fn inline_ping_applies_expected_transitions(
        #[case] sequence: i32,
        #[case] expected: Vec<Recorded>,
    ) {
        let sink = Arc::new(RecordingSink::default());
        let tracker = LivenessTracker::new(sink.clone(), None);

        tracker.record_ping(Arc::new(StubPeer), sequence, 1_700_000_000_000);

        assert_eq!(sink.records(), expected);
    }

    #[test]
    fn run_state_failure_skips_the_event() {
        let sink = Arc::new(RecordingSink {
            fail_run_state: true,
            ..RecordingSink::default()
        });
        let tracker = LivenessTracker::new(sink.clone(), None);

        tracker.record_ping(Arc::new(StubPeer), 3, 0);

        assert!(sink.records().is_empty());
    }

    #[test]
    fn pings_run_on_the_event_executor() {
        let sink = Arc::new(RecordingSink::default());
        let executor = Arc::new(WorkerPool::new("event-test", 1, 4).expect("build executor"));
        let tracker = LivenessTracker::new(sink.clone(), Some(Arc::clone(&executor)));

        tracker.record_ping(Arc::new(StubPeer), 5, 0);
        executor.shutdown();
        executor.await_termination(Duration::from_secs(5));

        assert_eq!(sink.records().len(), 2);
    }

    #[test]
    fn ping_after_executor_shutdown_is_dropped() {
        let sink = Arc::new(RecordingSink::default());
        let executor = Arc::new(WorkerPool::new("event-closed", 1, 1).expect("build executor"));
        executor.shutdown();
        let tracker = LivenessTracker::new(sink.clone(), Some(executor));

        tracker.record_ping(Arc::new(StubPeer), 5, 0);

        assert!(sink.records().is_empty());
    }

    struct PanickingSink;

    impl LifecycleSink for PanickingSink {
        fn apply_run_state(
            &self,
            _connection: &dyn PeerConnection,
            _timestamp: u64,
            _state: AgentLifecycleState,
            _sequence: i32,
        ) -> Result<(), LifecycleError> {
            panic!("sink bug")
        }

        fn emit_event(
            &self,
            _connection: &dyn PeerConnection,
            _timestamp: u64,
            _kind: AgentEventKind,
        ) -> Result<(), LifecycleError> {
            panic!("sink bug")
        }
    }

    #[test]
    fn sink_panics_are_contained() {
        let tracker = LivenessTracker::new(Arc::new(PanickingSink), None);
        tracker.record_ping(Arc::new(StubPeer), 1, 0);
    }
}

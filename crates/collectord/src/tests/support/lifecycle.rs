//! Lifecycle sink double.

use std::sync::Mutex;

use crate::liveness::{AgentEventKind, AgentLifecycleState, LifecycleError, LifecycleSink};
use crate::transport::PeerConnection;

/// One call observed by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleRecord {
    /// A run-state transition.
    RunState(AgentLifecycleState, i32),
    /// An agent event.
    Event(AgentEventKind),
}

/// Sink recording every call in order.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<LifecycleRecord>>,
}

impl RecordingSink {
    /// Calls recorded so far.
    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records.lock().expect("sink mutex poisoned").clone()
    }

    /// Number of run-state transitions.
    pub fn transitions(&self) -> usize {
        self.records()
            .iter()
            .filter(|record| matches!(record, LifecycleRecord::RunState(..)))
            .count()
    }

    /// Number of events.
    pub fn events(&self) -> usize {
        self.records()
            .iter()
            .filter(|record| matches!(record, LifecycleRecord::Event(_)))
            .count()
    }

    fn record(&self, record: LifecycleRecord) {
        self.records.lock().expect("sink mutex poisoned").push(record);
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
        self.record(LifecycleRecord::RunState(state, sequence));
        Ok(())
    }

    fn emit_event(
        &self,
        _connection: &dyn PeerConnection,
        _timestamp: u64,
        kind: AgentEventKind,
    ) -> Result<(), LifecycleError> {
        self.record(LifecycleRecord::Event(kind));
        Ok(())
    }
}

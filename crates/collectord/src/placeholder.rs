//! Placeholder collaborators used by the binary until real business
//! handlers and lifecycle storage are wired in.

use crate::codec::Envelope;
use crate::dispatch::{DispatchHandler, HandlerError};
use crate::liveness::{AgentEventKind, AgentLifecycleState, LifecycleError, LifecycleSink};
use crate::transport::PeerConnection;

const PLACEHOLDER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::placeholder");

/// Dispatcher that logs every message and never answers requests.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingDispatchHandler;

impl DispatchHandler<Envelope> for LoggingDispatchHandler {
    fn dispatch_send(&self, message: Envelope) -> Result<(), HandlerError> {
        tracing::debug!(
            target: PLACEHOLDER_TARGET,
            kind = %message.kind,
            "send message received"
        );
        Ok(())
    }

    fn dispatch_request(&self, message: Envelope) -> Result<Option<Envelope>, HandlerError> {
        tracing::warn!(
            target: PLACEHOLDER_TARGET,
            kind = %message.kind,
            "request received but no handler is registered"
        );
        Ok(None)
    }
}

/// Lifecycle sink that records agent liveness in the log only.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TracingLifecycleSink;

impl LifecycleSink for TracingLifecycleSink {
    fn apply_run_state(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        state: AgentLifecycleState,
        sequence: i32,
    ) -> Result<(), LifecycleError> {
        let properties = connection.properties();
        tracing::info!(
            target: PLACEHOLDER_TARGET,
            remote = %connection.remote_addr(),
            agent_id = properties.as_ref().and_then(|properties| properties.agent_id()),
            timestamp,
            ?state,
            sequence,
            "agent run state updated"
        );
        Ok(())
    }

    fn emit_event(
        &self,
        connection: &dyn PeerConnection,
        timestamp: u64,
        kind: AgentEventKind,
    ) -> Result<(), LifecycleError> {
        tracing::debug!(
            target: PLACEHOLDER_TARGET,
            remote = %connection.remote_addr(),
            timestamp,
            ?kind,
            "agent event"
        );
        Ok(())
    }
}

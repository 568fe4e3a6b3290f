//! Message-dispatch front end for the telemetry collector.
//!
//! Agents hold long-lived TCP connections to the collector. Each connection
//! opens with a handshake validated by the [`ConnectionGate`]; accepted
//! connections then push one-way packets, send requests that expect a
//! response, and ping periodically to prove they are alive.
//!
//! The [`TcpReceiver`] turns that stream into bounded, fault-isolated work:
//!
//! - Decoding, business dispatch and reply encoding run on a fixed
//!   [`WorkerPool`] fed through a bounded queue. When the queue is full new
//!   work is rejected immediately rather than blocking transport threads.
//! - Pings are applied to the [`LifecycleSink`] on a separate executor, so a
//!   saturated work queue never starves liveness.
//! - Every failure is logged and swallowed at the dispatch boundary. Failed
//!   requests simply go unanswered.
//! - [`TcpReceiver::stop`] closes the acceptor first and then gives each
//!   executor a bounded grace period to drain.
//!
//! The transport, codec, business dispatcher and lifecycle sink are
//! collaborators behind traits. [`TcpAcceptor`] and [`JsonCodec`] are the
//! reference implementations used by the `collectord` binary.

mod bootstrap;
pub mod codec;
pub mod dispatch;
pub mod gate;
mod health;
pub mod liveness;
mod placeholder;
pub mod pool;
mod process;
pub mod receiver;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    BootstrapError, Collector, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use codec::{Codec, CodecError, Envelope, JsonCodec};
pub use dispatch::{DispatchError, DispatchHandler, Dispatcher, HandlerError};
pub use gate::{ConnectionGate, HandshakeDecision, HandshakeProperties};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use liveness::{
    AgentEventKind, AgentLifecycleState, LifecycleError, LifecycleSink, LivenessTracker,
};
pub use pool::{DrainOutcome, PoolError, WorkerPool};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_collector,
    run_collector_with,
};
pub use receiver::{
    Collaborators, ReceiverError, ResolveError, ShutdownCoordinator, ShutdownOutcome, TcpReceiver,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{ServerAcceptor, TcpAcceptor, TransportError};

#[cfg(test)]
mod tests;

//! Collector process supervision: bootstrap, serve until signalled, stop.

use std::io;
use std::sync::Arc;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::codec::JsonCodec;
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::placeholder::{LoggingDispatchHandler, TracingLifecycleSink};
use crate::receiver::{Collaborators, ReceiverError, ShutdownOutcome};
use crate::transport::TcpAcceptor;

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors surfaced while launching or supervising the collector process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the collector failed.
    #[error("collector bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[source]
        source: BootstrapError,
    },
    /// The receiver could not be built or started.
    #[error("receiver failed: {source}")]
    Receiver {
        /// Underlying receiver error.
        #[source]
        source: ReceiverError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The drain wait was interrupted during shutdown.
    #[error("shutdown interrupted before the executors drained")]
    Interrupted,
}

impl From<BootstrapError> for LaunchError {
    fn from(source: BootstrapError) -> Self {
        Self::Bootstrap { source }
    }
}

impl From<ReceiverError> for LaunchError {
    fn from(source: ReceiverError) -> Self {
        Self::Receiver { source }
    }
}

impl From<ShutdownError> for LaunchError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until shutdown should proceed.
    fn wait(&self) -> Result<(), ShutdownError>;
}

/// Shutdown listener that waits for termination signals.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemShutdownSignal;

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<(), ShutdownError> {
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| ShutdownError::Install { source })?;
        if let Some(signal) = signals.forever().next() {
            info!(target: PROCESS_TARGET, signal, "shutdown signal received");
        }
        Ok(())
    }
}

/// Runs the collector with system configuration and signal handling.
pub fn run_collector() -> Result<(), LaunchError> {
    let reporter: Arc<dyn HealthReporter> = Arc::new(StructuredHealthReporter::new());
    run_collector_with(&SystemConfigLoader, reporter, &SystemShutdownSignal).map(|_| ())
}

/// Runs the collector until `signal` fires, then stops it.
pub fn run_collector_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    signal: &dyn ShutdownSignal,
) -> Result<ShutdownOutcome, LaunchError> {
    let collector = bootstrap_with(loader, reporter)?;
    let receiver = collector.receiver(Collaborators {
        codec: JsonCodec,
        handler: LoggingDispatchHandler,
        lifecycle: Arc::new(TracingLifecycleSink),
        acceptor: Arc::new(TcpAcceptor::new()),
        cluster: None,
    })?;

    if let Err(error) = receiver.start() {
        receiver.stop();
        return Err(error.into());
    }

    let waited = signal.wait();
    let outcome = receiver.stop();
    waited?;
    if outcome.is_interrupted() {
        return Err(LaunchError::Interrupted);
    }
    Ok(outcome)
}

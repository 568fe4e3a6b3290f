//! Structured health reporting for collector lifecycle events.

use std::sync::Arc;

use collector_config::Config;

use crate::bootstrap::BootstrapError;
use crate::receiver::{ResolveError, ShutdownOutcome};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked before the receiver binds its acceptor.
    fn receiver_starting(&self, host: &str, port: u16);

    /// Invoked once the acceptor is accepting connections.
    fn receiver_bound(&self, host: &str, port: u16);

    /// Invoked when the probe ignore list could not be resolved.
    fn probe_resolution_failed(&self, error: &ResolveError);

    /// Invoked when shutdown begins.
    fn receiver_stopping(&self);

    /// Invoked once the executors have drained or the wait ended.
    fn receiver_stopped(&self, outcome: ShutdownOutcome);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn receiver_starting(&self, host: &str, port: u16) {
        (**self).receiver_starting(host, port);
    }

    fn receiver_bound(&self, host: &str, port: u16) {
        (**self).receiver_bound(host, port);
    }

    fn probe_resolution_failed(&self, error: &ResolveError) {
        (**self).probe_resolution_failed(error);
    }

    fn receiver_stopping(&self) {
        (**self).receiver_stopping();
    }

    fn receiver_stopped(&self, outcome: ShutdownOutcome) {
        (**self).receiver_stopped(outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting collector bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            listen_ip = %config.listen_ip(),
            listen_port = config.listen_port(),
            worker_threads = config.worker_threads(),
            worker_queue_size = config.worker_queue_size(),
            event_worker_threads = config.event_worker_threads(),
            log_format = ?config.log_format(),
            "collector bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "collector bootstrap failed"
        );
    }

    fn receiver_starting(&self, host: &str, port: u16) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "receiver_starting",
            host,
            port,
            "starting tcp receiver"
        );
    }

    fn receiver_bound(&self, host: &str, port: u16) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "receiver_bound",
            host,
            port,
            "tcp receiver accepting connections"
        );
    }

    fn probe_resolution_failed(&self, error: &ResolveError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "probe_resolution_failed",
            error = %error,
            "probe ignore list disabled"
        );
    }

    fn receiver_stopping(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "receiver_stopping",
            "stopping tcp receiver"
        );
    }

    fn receiver_stopped(&self, outcome: ShutdownOutcome) {
        if outcome == ShutdownOutcome::Drained {
            tracing::info!(
                target: HEALTH_TARGET,
                event = "receiver_stopped",
                outcome = ?outcome,
                "tcp receiver stopped"
            );
        } else {
            tracing::warn!(
                target: HEALTH_TARGET,
                event = "receiver_stopped",
                outcome = ?outcome,
                "tcp receiver stopped before workers drained"
            );
        }
    }
}

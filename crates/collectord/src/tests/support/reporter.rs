//! Health reporter double.

use std::sync::Mutex;

use collector_config::Config;

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;
use crate::receiver::{ResolveError, ShutdownOutcome};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The receiver began starting.
    ReceiverStarting,
    /// The acceptor was bound.
    ReceiverBound,
    /// The probe ignore list could not be resolved.
    ProbeResolutionFailed,
    /// Shutdown began.
    ReceiverStopping,
    /// Shutdown finished.
    ReceiverStopped(ShutdownOutcome),
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn receiver_starting(&self, _host: &str, _port: u16) {
        self.record(HealthEvent::ReceiverStarting);
    }

    fn receiver_bound(&self, _host: &str, _port: u16) {
        self.record(HealthEvent::ReceiverBound);
    }

    fn probe_resolution_failed(&self, _error: &ResolveError) {
        self.record(HealthEvent::ProbeResolutionFailed);
    }

    fn receiver_stopping(&self) {
        self.record(HealthEvent::ReceiverStopping);
    }

    fn receiver_stopped(&self, outcome: ShutdownOutcome) {
        self.record(HealthEvent::ReceiverStopped(outcome));
    }
}

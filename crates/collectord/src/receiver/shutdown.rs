//! Orderly shutdown of the receiver's executors.

use std::time::Duration;

use tracing::{info, warn};

use crate::pool::{DrainOutcome, WorkerPool};

use super::RECEIVER_TARGET;

/// Grace period granted to each executor when none is configured.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// How [`TcpReceiver::stop`](super::TcpReceiver::stop) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every executor finished its queued work.
    Drained,
    /// At least one executor was still busy when its grace period elapsed.
    TimedOut,
    /// The drain wait was cut short; later executors were not waited on.
    Interrupted,
    /// A previous call already stopped the receiver.
    AlreadyStopped,
}

impl ShutdownOutcome {
    /// Whether the wait was interrupted.
    #[must_use]
    pub const fn is_interrupted(self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

/// Closes executors and waits a bounded time for each to drain.
#[derive(Debug, Clone, Copy)]
pub struct ShutdownCoordinator {
    grace: Duration,
}

impl ShutdownCoordinator {
    /// Builds a coordinator granting `grace` to each executor.
    #[must_use]
    pub const fn new(grace: Duration) -> Self {
        Self { grace }
    }

    /// Grace period per executor.
    #[must_use]
    pub const fn grace(&self) -> Duration {
        self.grace
    }

    /// Shuts every executor down, then waits for each in order.
    ///
    /// `None` entries stand for executors that were never created. Nothing is
    /// cancelled: a timed-out executor keeps running its current tasks in the
    /// background.
    pub fn shutdown(&self, executors: &[Option<&WorkerPool>]) -> ShutdownOutcome {
        for executor in executors.iter().flatten() {
            executor.shutdown();
        }

        let mut outcome = ShutdownOutcome::Drained;
        for executor in executors.iter().flatten() {
            match executor.await_termination(self.grace) {
                DrainOutcome::Drained => {
                    info!(target: RECEIVER_TARGET, pool = executor.name(), "executor drained");
                }
                DrainOutcome::TimedOut => {
                    warn!(
                        target: RECEIVER_TARGET,
                        pool = executor.name(),
                        grace_ms = self.grace.as_millis(),
                        busy_workers = executor.live_workers(),
                        "executor still busy after grace period"
                    );
                    outcome = ShutdownOutcome::TimedOut;
                }
                DrainOutcome::Interrupted => {
                    warn!(
                        target: RECEIVER_TARGET,
                        pool = executor.name(),
                        "drain wait interrupted"
                    );
                    return ShutdownOutcome::Interrupted;
                }
            }
        }
        outcome
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DRAIN_TIMEOUT)
    }
}

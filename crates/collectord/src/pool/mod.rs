//! Fixed-size worker pool fed through a bounded queue.
//!
//! Producers never block: [`WorkerPool::submit`] either places the task on
//! the queue or fails immediately, so the transport threads delivering
//! packets stay responsive when the workers fall behind. Shutdown is
//! cooperative. Closing the queue lets the workers finish everything already
//! queued, and [`WorkerPool::await_termination`] waits for them for a bounded
//! time without cancelling anything.

mod errors;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use tracing::{debug, warn};

pub use self::errors::PoolError;

const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Result of waiting for a pool to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every worker finished.
    Drained,
    /// The grace period elapsed with workers still busy.
    TimedOut,
    /// The wait was cut short before the workers finished.
    Interrupted,
}

/// Bounded pool of named worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    capacity: usize,
    sender: RwLock<Option<Sender<Task>>>,
    live: Arc<LiveWorkers>,
}

impl WorkerPool {
    /// Spawns `threads` workers sharing a queue holding at most `capacity` tasks.
    pub fn new(name: impl Into<String>, threads: usize, capacity: usize) -> Result<Self, PoolError> {
        let name = name.into();
        if threads == 0 {
            return Err(PoolError::NoThreads { pool: name });
        }
        if capacity == 0 {
            return Err(PoolError::NoCapacity { pool: name });
        }

        let (sender, receiver) = channel::bounded::<Task>(capacity);
        let live = Arc::new(LiveWorkers::default());
        for index in 0..threads {
            live.register();
            let worker_receiver = receiver.clone();
            let worker_live = Arc::clone(&live);
            let pool_name = name.clone();
            let spawned = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || run_worker(&pool_name, &worker_receiver, &worker_live));
            if let Err(source) = spawned {
                live.deregister();
                // Dropping the sender releases the workers spawned so far.
                drop(sender);
                return Err(PoolError::Spawn { pool: name, source });
            }
        }

        debug!(
            target: POOL_TARGET,
            pool = %name,
            threads,
            capacity,
            "worker pool started"
        );
        Ok(Self {
            name,
            capacity,
            sender: RwLock::new(Some(sender)),
            live,
        })
    }

    /// Pool name, also used as the worker thread name prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of worker threads that have not yet exited.
    #[must_use]
    pub fn live_workers(&self) -> usize {
        *self.live.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `task` without blocking.
    ///
    /// Fails with [`PoolError::Rejected`] when the queue is full and with
    /// [`PoolError::Shutdown`] once [`shutdown`](Self::shutdown) has run.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(PoolError::Shutdown {
                pool: self.name.clone(),
            });
        };
        match sender.try_send(Box::new(task)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PoolError::Rejected {
                pool: self.name.clone(),
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(PoolError::Shutdown {
                pool: self.name.clone(),
            }),
        }
    }

    /// Stops accepting tasks. Queued tasks still run.
    pub fn shutdown(&self) {
        let closed = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            debug!(target: POOL_TARGET, pool = %self.name, "worker pool closed");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Blocks until every worker exits or `timeout` elapses.
    ///
    /// Workers only exit after [`shutdown`](Self::shutdown), so calling this on
    /// an open pool simply waits out the timeout.
    pub fn await_termination(&self, timeout: Duration) -> DrainOutcome {
        let Ok(count) = self.live.count.lock() else {
            return DrainOutcome::Interrupted;
        };
        match self
            .live
            .exited
            .wait_timeout_while(count, timeout, |live| *live > 0)
        {
            Ok((_, wait)) if wait.timed_out() => DrainOutcome::TimedOut,
            Ok(_) => DrainOutcome::Drained,
            Err(_) => DrainOutcome::Interrupted,
        }
    }
}

impl WorkerPool {
    /// Poisons the live-worker lock so later drain waits report an
    /// interruption.
    #[cfg(test)]
    pub(crate) fn poison_drain_lock(&self) {
        let live = Arc::clone(&self.live);
        let poisoner = thread::spawn(move || {
            let _guard = live.count.lock().unwrap_or_else(PoisonError::into_inner);
            panic!("poisoning the drain lock");
        });
        assert!(poisoner.join().is_err(), "poisoning thread must panic");
    }
}

#[derive(Debug, Default)]
struct LiveWorkers {
    count: Mutex<usize>,
    exited: Condvar,
}

impl LiveWorkers {
    fn register(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count += 1;
    }

    fn deregister(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        self.exited.notify_all();
    }
}

/// Decrements the live count however the worker loop ends.
struct WorkerExit<'a>(&'a LiveWorkers);

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        self.0.deregister();
    }
}

fn run_worker(pool: &str, receiver: &Receiver<Task>, live: &LiveWorkers) {
    let _exit = WorkerExit(live);
    for task in receiver.iter() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
            warn!(
                target: POOL_TARGET,
                pool,
                panic = %panic_message(payload.as_ref()),
                "worker task panicked"
            );
        }
    }
}

/// Renders a panic payload for logging.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

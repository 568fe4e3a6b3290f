//! Shared configuration for the collector TCP receiver.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! configuration file (`--config-path` or `COLLECTOR_CONFIG_PATH`), then
//! `COLLECTOR_*` environment variables, and finally command-line flags.
//! [`Config::validate`] enforces the sizing invariants the dispatch pools rely
//! on before the receiver is constructed.

mod defaults;
mod logging;

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use defaults::{
    DEFAULT_EVENT_WORKER_QUEUE_SIZE, DEFAULT_EVENT_WORKER_THREADS, DEFAULT_LISTEN_IP,
    DEFAULT_LISTEN_PORT, DEFAULT_LOG_FILTER, DEFAULT_WORKER_QUEUE_SIZE, DEFAULT_WORKER_THREADS,
    default_event_worker_queue_size, default_event_worker_threads, default_listen_ip,
    default_listen_port, default_log_filter, default_log_filter_string, default_log_format,
    default_worker_queue_size, default_worker_threads,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration for the collector receiver.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COLLECTOR")]
pub struct Config {
    /// Address the TCP acceptor binds to.
    #[ortho_config(default = defaults::default_listen_ip())]
    #[serde(default = "defaults::default_listen_ip")]
    pub listen_ip: String,
    /// Port the TCP acceptor binds to.
    #[ortho_config(default = defaults::DEFAULT_LISTEN_PORT)]
    #[serde(default = "defaults::default_listen_port")]
    pub listen_port: u16,
    /// Number of threads decoding and dispatching inbound packets.
    #[ortho_config(default = defaults::DEFAULT_WORKER_THREADS)]
    #[serde(default = "defaults::default_worker_threads")]
    pub worker_threads: usize,
    /// Capacity of the bounded dispatch queue.
    #[ortho_config(default = defaults::DEFAULT_WORKER_QUEUE_SIZE)]
    #[serde(default = "defaults::default_worker_queue_size")]
    pub worker_queue_size: usize,
    /// Threads recording agent liveness events. Zero runs them inline.
    #[ortho_config(default = defaults::DEFAULT_EVENT_WORKER_THREADS)]
    #[serde(default = "defaults::default_event_worker_threads")]
    pub event_worker_threads: usize,
    /// Capacity of the liveness event queue.
    #[ortho_config(default = defaults::DEFAULT_EVENT_WORKER_QUEUE_SIZE)]
    #[serde(default = "defaults::default_event_worker_queue_size")]
    pub event_worker_queue_size: usize,
    /// Hosts whose connections are infrastructure probes rather than agents.
    #[ortho_config(merge_strategy = "append")]
    #[serde(default)]
    pub l4_ip_list: Vec<String>,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_ip: default_listen_ip(),
            listen_port: DEFAULT_LISTEN_PORT,
            worker_threads: DEFAULT_WORKER_THREADS,
            worker_queue_size: DEFAULT_WORKER_QUEUE_SIZE,
            event_worker_threads: DEFAULT_EVENT_WORKER_THREADS,
            event_worker_queue_size: DEFAULT_EVENT_WORKER_QUEUE_SIZE,
            l4_ip_list: Vec::new(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Loads configuration from the process arguments and environment.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from an explicit argument iterator.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Checks the sizing invariants required by the receiver.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_ip.trim().is_empty() {
            return Err(ConfigError::BlankListenIp);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::NotPositive {
                field: "worker_threads",
            });
        }
        if self.worker_queue_size == 0 {
            return Err(ConfigError::NotPositive {
                field: "worker_queue_size",
            });
        }
        if self.event_worker_threads > 0 && self.event_worker_queue_size == 0 {
            return Err(ConfigError::NotPositive {
                field: "event_worker_queue_size",
            });
        }
        Ok(())
    }

    /// Address the acceptor binds to.
    #[must_use]
    pub fn listen_ip(&self) -> &str {
        &self.listen_ip
    }

    /// Port the acceptor binds to.
    #[must_use]
    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Dispatch worker count.
    #[must_use]
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// Dispatch queue capacity.
    #[must_use]
    pub fn worker_queue_size(&self) -> usize {
        self.worker_queue_size
    }

    /// Liveness executor thread count; zero disables the executor.
    #[must_use]
    pub fn event_worker_threads(&self) -> usize {
        self.event_worker_threads
    }

    /// Liveness executor queue capacity.
    #[must_use]
    pub fn event_worker_queue_size(&self) -> usize {
        self.event_worker_queue_size
    }

    /// Probe hosts to ignore, as configured (unresolved).
    #[must_use]
    pub fn l4_ip_list(&self) -> &[String] {
        &self.l4_ip_list
    }

    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

/// Invariant violations detected by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A pool sizing option was zero.
    #[error("{field} must be greater than zero")]
    NotPositive {
        /// Name of the offending option.
        field: &'static str,
    },
    /// The listen address was empty.
    #[error("listen_ip must not be blank")]
    BlankListenIp,
}

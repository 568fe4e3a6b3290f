/// Default bind address for the TCP acceptor.
pub const DEFAULT_LISTEN_IP: &str = "0.0.0.0";

/// Default TCP port agents connect to.
pub const DEFAULT_LISTEN_PORT: u16 = 9994;

/// Default number of dispatch worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 16;

/// Default capacity of the dispatch queue.
pub const DEFAULT_WORKER_QUEUE_SIZE: usize = 1024;

/// Default number of liveness event threads.
pub const DEFAULT_EVENT_WORKER_THREADS: usize = 4;

/// Default capacity of the liveness event queue.
pub const DEFAULT_EVENT_WORKER_QUEUE_SIZE: usize = 1024;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned default bind address.
pub fn default_listen_ip() -> String {
    DEFAULT_LISTEN_IP.to_owned()
}

/// Default listen port, as a function for serde.
pub const fn default_listen_port() -> u16 {
    DEFAULT_LISTEN_PORT
}

/// Default dispatch worker count, as a function for serde.
pub const fn default_worker_threads() -> usize {
    DEFAULT_WORKER_THREADS
}

/// Default dispatch queue capacity, as a function for serde.
pub const fn default_worker_queue_size() -> usize {
    DEFAULT_WORKER_QUEUE_SIZE
}

/// Default liveness thread count, as a function for serde.
pub const fn default_event_worker_threads() -> usize {
    DEFAULT_EVENT_WORKER_THREADS
}

/// Default liveness queue capacity, as a function for serde.
pub const fn default_event_worker_queue_size() -> usize {
    DEFAULT_EVENT_WORKER_QUEUE_SIZE
}

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

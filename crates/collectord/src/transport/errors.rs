//! Error types for transport operations.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Errors surfaced while binding the acceptor or writing to a connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to resolve TCP address {host}:{port}: {source}")]
    Resolve {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("no TCP addresses resolved for {host}:{port}")]
    ResolveEmpty { host: String, port: u16 },
    #[error("failed to bind TCP listener at {addr}: {source}")]
    BindTcp {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking listener: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("acceptor is already bound")]
    AlreadyBound,
    #[error("acceptor has been closed")]
    Closed,
    #[error("no message listener registered before bind")]
    MissingListener,
    #[error("failed to spawn transport thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    #[error("failed to write frame to {remote}: {source}")]
    Write {
        remote: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialise frame: {0}")]
    Serialise(#[from] serde_json::Error),
    #[error("accept thread panicked")]
    ThreadPanic,
}

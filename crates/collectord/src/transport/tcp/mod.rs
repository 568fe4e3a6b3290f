//! Line-delimited JSON transport over TCP.
//!
//! Each connection carries newline-terminated [`Frame`] documents. The
//! accept loop runs on its own thread and hands every accepted socket to a
//! dedicated connection thread, which performs the handshake and then feeds
//! traffic into the registered [`MessageListener`].

mod connection;
mod frame;
mod listener;

use std::collections::HashMap;
use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;

use tracing::{debug, info, warn};

use super::{
    ConnectionState, MessageListener, PeerConnection, ServerAcceptor, StateChangeHandler,
    TransportError,
};

pub use self::frame::Frame;

const TCP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport::tcp");

/// State shared between the acceptor handle, the accept loop and the
/// connection threads.
#[derive(Default)]
struct AcceptorShared {
    listener: RwLock<Option<Arc<dyn MessageListener>>>,
    handlers: RwLock<Vec<Arc<dyn StateChangeHandler>>>,
    ignored: RwLock<Vec<IpAddr>>,
    connections: Mutex<HashMap<u64, TcpStream>>,
    next_connection: AtomicU64,
    closed: AtomicBool,
}

impl AcceptorShared {
    fn message_listener(&self) -> Option<Arc<dyn MessageListener>> {
        self.listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn is_ignored(&self, address: IpAddr) -> bool {
        self.ignored
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&address)
    }

    fn notify(&self, connection: &dyn PeerConnection, state: ConnectionState) {
        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for handler in handlers {
            handler.state_updated(connection, state);
        }
    }

    /// Tracks `stream` so [`TcpAcceptor::close`] can shut it down. Returns
    /// `None` once the acceptor has closed.
    fn track(&self, stream: &TcpStream) -> Option<u64> {
        let clone = stream.try_clone().ok()?;
        let mut connections = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::SeqCst) {
            return None;
        }
        let id = self.next_connection.fetch_add(1, Ordering::Relaxed);
        connections.insert(id, clone);
        Some(id)
    }

    fn forget(&self, id: u64) {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    fn close_connections(&self) -> usize {
        let drained: Vec<TcpStream> = self
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        for stream in &drained {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(target: TCP_TARGET, %error, "connection already closed");
            }
        }
        drained.len()
    }
}

struct AcceptLoop {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

/// TCP implementation of [`ServerAcceptor`].
#[derive(Default)]
pub struct TcpAcceptor {
    shared: Arc<AcceptorShared>,
    accept: Mutex<Option<AcceptLoop>>,
}

impl TcpAcceptor {
    /// Creates an unbound acceptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the acceptor is listening on, once bound.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.accept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|accept| accept.local_addr)
    }
}

impl ServerAcceptor for TcpAcceptor {
    fn add_state_change_handler(&self, handler: Arc<dyn StateChangeHandler>) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    fn set_ignore_addresses(&self, addresses: Vec<IpAddr>) {
        *self
            .shared
            .ignored
            .write()
            .unwrap_or_else(PoisonError::into_inner) = addresses;
    }

    fn set_message_listener(&self, listener: Arc<dyn MessageListener>) {
        *self
            .shared
            .listener
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    fn bind(&self, host: &str, port: u16) -> Result<(), TransportError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut accept = self.accept.lock().unwrap_or_else(PoisonError::into_inner);
        if accept.is_some() {
            return Err(TransportError::AlreadyBound);
        }
        if self.shared.message_listener().is_none() {
            return Err(TransportError::MissingListener);
        }

        let socket = listener::bind_tcp(host, port)?;
        socket
            .set_nonblocking(true)
            .map_err(|source| TransportError::NonBlocking { source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| TransportError::BindTcp {
                addr: SocketAddr::from(([0, 0, 0, 0], port)),
                source,
            })?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let loop_shutdown = Arc::clone(&shutdown);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(String::from("collector-tcp-acceptor"))
            .spawn(move || listener::run_accept_loop(&socket, &loop_shutdown, &shared))
            .map_err(|source| TransportError::Spawn { source })?;

        info!(target: TCP_TARGET, %local_addr, "tcp acceptor bound");
        *accept = Some(AcceptLoop {
            local_addr,
            shutdown,
            handle,
        });
        Ok(())
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        let Some(accept) = self
            .accept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        accept.shutdown.store(true, Ordering::SeqCst);
        if accept.handle.join().is_err() {
            warn!(
                target: TCP_TARGET,
                error = %TransportError::ThreadPanic,
                "accept loop ended abnormally"
            );
        }
        let closed = self.shared.close_connections();
        info!(
            target: TCP_TARGET,
            local_addr = %accept.local_addr,
            connections = closed,
            "tcp acceptor closed"
        );
    }
}

impl Drop for TcpAcceptor {
    fn drop(&mut self) {
        self.close();
    }
}

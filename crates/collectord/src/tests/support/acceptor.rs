//! In-memory acceptor and peer doubles.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};

use crate::gate::HandshakeProperties;
use crate::transport::{
    MessageListener, PeerConnection, ServerAcceptor, StateChangeHandler, TransportError,
};

/// Acceptor that records calls instead of opening sockets.
#[derive(Default)]
pub struct StubAcceptor {
    state: Mutex<AcceptorState>,
}

#[derive(Default)]
struct AcceptorState {
    handlers: Vec<Arc<dyn StateChangeHandler>>,
    ignored: Vec<IpAddr>,
    listener: Option<Arc<dyn MessageListener>>,
    binds: Vec<(String, u16)>,
    closes: usize,
    fail_bind: bool,
}

impl StubAcceptor {
    /// Builds an acceptor whose `bind` always fails.
    #[must_use]
    pub fn failing_bind() -> Self {
        let acceptor = Self::default();
        acceptor.lock().fail_bind = true;
        acceptor
    }

    /// Listener installed by the receiver.
    pub fn listener(&self) -> Arc<dyn MessageListener> {
        self.lock()
            .listener
            .clone()
            .expect("receiver should install a message listener")
    }

    /// Number of registered state-change handlers.
    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }

    /// Ignore list installed by the receiver.
    pub fn ignored(&self) -> Vec<IpAddr> {
        self.lock().ignored.clone()
    }

    /// Recorded `bind` calls.
    pub fn binds(&self) -> Vec<(String, u16)> {
        self.lock().binds.clone()
    }

    /// Number of `close` calls.
    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AcceptorState> {
        self.state.lock().expect("acceptor state mutex poisoned")
    }
}

impl ServerAcceptor for StubAcceptor {
    fn add_state_change_handler(&self, handler: Arc<dyn StateChangeHandler>) {
        self.lock().handlers.push(handler);
    }

    fn set_ignore_addresses(&self, addresses: Vec<IpAddr>) {
        self.lock().ignored = addresses;
    }

    fn set_message_listener(&self, listener: Arc<dyn MessageListener>) {
        self.lock().listener = Some(listener);
    }

    fn bind(&self, host: &str, port: u16) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.binds.push((host.to_owned(), port));
        if state.fail_bind {
            return Err(TransportError::BindTcp {
                addr: SocketAddr::from(([127, 0, 0, 1], port)),
                source: io::Error::from(io::ErrorKind::AddrInUse),
            });
        }
        Ok(())
    }

    fn close(&self) {
        self.lock().closes += 1;
    }
}

/// Connection double with a fixed remote address.
#[derive(Debug)]
pub struct StubPeer {
    remote: SocketAddr,
}

impl StubPeer {
    /// Shared peer suitable for `handle_ping`.
    pub fn shared() -> Arc<dyn PeerConnection> {
        Arc::new(Self {
            remote: SocketAddr::from(([10, 0, 0, 7], 41_000)),
        })
    }
}

impl PeerConnection for StubPeer {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn properties(&self) -> Option<HandshakeProperties> {
        None
    }
}

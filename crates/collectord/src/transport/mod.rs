//! Boundary between the receiver and the connection transport.
//!
//! The receiver never touches sockets directly. A [`ServerAcceptor`] owns
//! connection management, framing and handshake mechanics, and calls back
//! into a [`MessageListener`] on its own I/O threads for every handshake,
//! one-way packet, request and ping. [`TcpAcceptor`] is the line-delimited
//! JSON implementation shipped with the daemon.

mod errors;
mod tcp;

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::gate::{HandshakeDecision, HandshakeProperties};

pub use self::errors::TransportError;
pub use self::tcp::{Frame, TcpAcceptor};

/// A live agent connection as seen by lifecycle consumers.
pub trait PeerConnection: Send + Sync + fmt::Debug {
    /// Address of the connected agent.
    fn remote_addr(&self) -> SocketAddr;

    /// Properties accepted during the handshake, if it has completed.
    fn properties(&self) -> Option<HandshakeProperties>;
}

/// Single-use capability for answering one request.
pub trait ReplyHandle: Send {
    /// Address of the requesting agent.
    fn remote_addr(&self) -> SocketAddr;

    /// Sends `payload` as the response to the bound request.
    fn reply(self: Box<Self>, payload: Vec<u8>) -> Result<(), TransportError>;
}

/// One-way packet delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPacket {
    payload: Vec<u8>,
    remote_addr: SocketAddr,
}

impl SendPacket {
    /// Builds a packet received from `remote_addr`.
    #[must_use]
    pub fn new(payload: Vec<u8>, remote_addr: SocketAddr) -> Self {
        Self {
            payload,
            remote_addr,
        }
    }

    /// Originating address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Splits the packet into payload and address.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, SocketAddr) {
        (self.payload, self.remote_addr)
    }
}

/// Request packet carrying the handle used to answer it.
pub struct RequestPacket {
    payload: Vec<u8>,
    reply: Box<dyn ReplyHandle>,
}

impl RequestPacket {
    /// Builds a request bound to `reply`.
    #[must_use]
    pub fn new(payload: Vec<u8>, reply: Box<dyn ReplyHandle>) -> Self {
        Self { payload, reply }
    }

    /// Originating address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.reply.remote_addr()
    }

    /// Splits the request into payload and reply handle.
    #[must_use]
    pub fn into_parts(self) -> (Vec<u8>, Box<dyn ReplyHandle>) {
        (self.payload, self.reply)
    }
}

impl fmt::Debug for RequestPacket {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RequestPacket")
            .field("remote_addr", &self.remote_addr())
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Keep-alive signal. Negative ids carry no run-state meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPacket {
    ping_id: i32,
}

impl PingPacket {
    /// Builds a ping with the agent's event counter.
    #[must_use]
    pub const fn new(ping_id: i32) -> Self {
        Self { ping_id }
    }

    /// Event counter sent by the agent.
    #[must_use]
    pub const fn ping_id(self) -> i32 {
        self.ping_id
    }
}

/// Connection lifecycle transitions reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted; handshake pending.
    Connected,
    /// Handshake accepted in duplex mode.
    RunDuplex,
    /// Handshake accepted in simplex mode.
    RunSimplex,
    /// Connection closed.
    Closed,
}

/// Observer of connection state transitions.
pub trait StateChangeHandler: Send + Sync {
    /// Invoked on the transport thread after `connection` moves to `state`.
    fn state_updated(&self, connection: &dyn PeerConnection, state: ConnectionState);
}

/// Callbacks the transport invokes on its I/O threads.
///
/// Implementations must return quickly: anything beyond validation is handed
/// to a worker pool.
pub trait MessageListener: Send + Sync {
    /// Decides whether a connecting agent may send traffic.
    fn handle_handshake(&self, properties: Option<&HandshakeProperties>) -> HandshakeDecision;

    /// Accepts a one-way packet.
    fn handle_send(&self, packet: SendPacket);

    /// Accepts a request that may be answered through its reply handle.
    fn handle_request(&self, packet: RequestPacket);

    /// Accepts a keep-alive signal from `connection`.
    fn handle_ping(&self, packet: PingPacket, connection: Arc<dyn PeerConnection>);
}

/// Connection acceptor driven by the receiver.
pub trait ServerAcceptor: Send + Sync {
    /// Registers an observer for connection state transitions.
    fn add_state_change_handler(&self, handler: Arc<dyn StateChangeHandler>);

    /// Peers whose connections are dropped silently as infrastructure probes.
    fn set_ignore_addresses(&self, addresses: Vec<IpAddr>);

    /// Installs the callbacks for inbound traffic.
    fn set_message_listener(&self, listener: Arc<dyn MessageListener>);

    /// Binds to `host:port` and starts accepting connections.
    fn bind(&self, host: &str, port: u16) -> Result<(), TransportError>;

    /// Stops accepting and closes live connections. Blocks until the accept
    /// loop has exited.
    fn close(&self);
}

/// Optional cluster membership service interested in connection states.
pub trait ClusterService: Send + Sync {
    /// Whether clustering is switched on.
    fn is_enabled(&self) -> bool;

    /// Observer to register with the acceptor.
    fn state_change_handler(&self) -> Arc<dyn StateChangeHandler>;
}

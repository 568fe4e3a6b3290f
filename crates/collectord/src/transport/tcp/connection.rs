//! Per-connection reader loop for the TCP transport.

use std::io::BufReader;
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::gate::{HandshakeDecision, HandshakeProperties};
use crate::transport::{
    ConnectionState, MessageListener, PeerConnection, PingPacket, ReplyHandle, RequestPacket,
    SendPacket, TransportError,
};

use super::frame::{Frame, FrameError, FrameWriter, read_frame};
use super::{AcceptorShared, TCP_TARGET};

/// Connection state shared with lifecycle consumers and reply handles.
#[derive(Debug)]
pub(super) struct TcpPeer {
    remote: SocketAddr,
    properties: RwLock<Option<HandshakeProperties>>,
    writer: Arc<FrameWriter>,
}

impl PeerConnection for TcpPeer {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn properties(&self) -> Option<HandshakeProperties> {
        self.properties
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

struct TcpReplyHandle {
    request_id: u64,
    remote: SocketAddr,
    writer: Arc<FrameWriter>,
}

impl ReplyHandle for TcpReplyHandle {
    fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn reply(self: Box<Self>, payload: Vec<u8>) -> Result<(), TransportError> {
        self.writer.write(&Frame::Response {
            id: self.request_id,
            payload,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Serves one accepted connection until the peer disconnects or the
/// acceptor closes the socket.
pub(super) fn serve(
    stream: TcpStream,
    remote: SocketAddr,
    listener: &Arc<dyn MessageListener>,
    shared: &AcceptorShared,
) {
    let writer = match stream.try_clone() {
        Ok(clone) => Arc::new(FrameWriter::new(clone, remote)),
        Err(error) => {
            warn!(target: TCP_TARGET, %remote, %error, "failed to clone connection stream");
            return;
        }
    };
    let peer = Arc::new(TcpPeer {
        remote,
        properties: RwLock::new(None),
        writer,
    });
    shared.notify(peer.as_ref(), ConnectionState::Connected);

    let mut reader = BufReader::new(stream);
    loop {
        let flow = match read_frame(&mut reader) {
            Ok(Some(frame)) => handle_frame(frame, &peer, listener, shared),
            Ok(None) => Flow::Close,
            Err(FrameError::Malformed(error)) => {
                warn!(target: TCP_TARGET, %remote, %error, "dropping malformed frame");
                Flow::Continue
            }
            Err(error) => {
                debug!(target: TCP_TARGET, %remote, %error, "connection read failed");
                Flow::Close
            }
        };
        if flow == Flow::Close {
            break;
        }
    }

    shared.notify(peer.as_ref(), ConnectionState::Closed);
}

fn handle_frame(
    frame: Frame,
    peer: &Arc<TcpPeer>,
    listener: &Arc<dyn MessageListener>,
    shared: &AcceptorShared,
) -> Flow {
    let handshaken = peer
        .properties
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some();

    match frame {
        Frame::Handshake { properties } if !handshaken => {
            handshake(properties, peer, listener, shared)
        }
        Frame::Handshake { .. } => {
            warn!(target: TCP_TARGET, remote = %peer.remote, "ignoring repeated handshake");
            Flow::Continue
        }
        _ if !handshaken => {
            warn!(
                target: TCP_TARGET,
                remote = %peer.remote,
                "closing connection that sent traffic before its handshake"
            );
            Flow::Close
        }
        Frame::Send { payload } => {
            listener.handle_send(SendPacket::new(payload, peer.remote));
            Flow::Continue
        }
        Frame::Request { id, payload } => {
            let reply = TcpReplyHandle {
                request_id: id,
                remote: peer.remote,
                writer: Arc::clone(&peer.writer),
            };
            listener.handle_request(RequestPacket::new(payload, Box::new(reply)));
            Flow::Continue
        }
        Frame::Ping { id } => {
            let connection: Arc<dyn PeerConnection> = Arc::clone(peer) as Arc<dyn PeerConnection>;
            listener.handle_ping(PingPacket::new(id), connection);
            write_or_close(peer, &Frame::Pong { id })
        }
        Frame::HandshakeResponse { .. } | Frame::Response { .. } | Frame::Pong { .. } => {
            debug!(target: TCP_TARGET, remote = %peer.remote, "ignoring collector-bound frame");
            Flow::Continue
        }
    }
}

fn handshake(
    properties: Option<HandshakeProperties>,
    peer: &TcpPeer,
    listener: &Arc<dyn MessageListener>,
    shared: &AcceptorShared,
) -> Flow {
    let decision = listener.handle_handshake(properties.as_ref());
    if write_or_close(peer, &Frame::HandshakeResponse { decision }) == Flow::Close {
        return Flow::Close;
    }
    if !decision.is_accepted() {
        debug!(
            target: TCP_TARGET,
            remote = %peer.remote,
            ?decision,
            "handshake rejected"
        );
        return Flow::Close;
    }
    *peer
        .properties
        .write()
        .unwrap_or_else(PoisonError::into_inner) = properties;
    let state = if decision == HandshakeDecision::AcceptedDuplex {
        ConnectionState::RunDuplex
    } else {
        ConnectionState::RunSimplex
    };
    shared.notify(peer, state);
    Flow::Continue
}

fn write_or_close(peer: &TcpPeer, frame: &Frame) -> Flow {
    match peer.writer.write(frame) {
        Ok(()) => Flow::Continue,
        Err(error) => {
            debug!(target: TCP_TARGET, remote = %peer.remote, %error, "connection write failed");
            Flow::Close
        }
    }
}

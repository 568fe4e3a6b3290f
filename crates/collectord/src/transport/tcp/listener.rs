//! Accept loop for the TCP acceptor.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::transport::TransportError;

use super::{AcceptorShared, TCP_TARGET, connection};

const ACCEPT_BACKOFF: Duration = Duration::from_millis(25);
const ERROR_BACKOFF: Duration = Duration::from_millis(150);

pub(super) fn bind_tcp(host: &str, port: u16) -> Result<TcpListener, TransportError> {
    let mut addrs = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_owned(),
            port,
            source,
        })?;
    let addr = addrs.next().ok_or_else(|| TransportError::ResolveEmpty {
        host: host.to_owned(),
        port,
    })?;
    TcpListener::bind(addr).map_err(|source| TransportError::BindTcp { addr, source })
}

pub(super) fn run_accept_loop(
    socket: &TcpListener,
    shutdown: &AtomicBool,
    shared: &Arc<AcceptorShared>,
) {
    info!(target: TCP_TARGET, "accept loop active");
    let mut last_error = None::<io::ErrorKind>;
    while !shutdown.load(Ordering::SeqCst) {
        match accept_connection(socket) {
            Ok(Some((stream, remote))) => {
                last_error = None;
                dispatch_connection(stream, remote, shared);
            }
            Ok(None) => thread::sleep(ACCEPT_BACKOFF),
            Err(error) => {
                let kind = error.kind();
                if last_error != Some(kind) {
                    warn!(target: TCP_TARGET, %error, "socket accept error");
                }
                last_error = Some(kind);
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }
}

fn accept_connection(socket: &TcpListener) -> Result<Option<(TcpStream, SocketAddr)>, io::Error> {
    match socket.accept() {
        Ok((stream, remote)) => {
            stream.set_nonblocking(false)?;
            Ok(Some((stream, remote)))
        }
        Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
        Err(error) => Err(error),
    }
}

fn dispatch_connection(stream: TcpStream, remote: SocketAddr, shared: &Arc<AcceptorShared>) {
    // Load balancer health checks only open and close the socket.
    if shared.is_ignored(remote.ip()) {
        return;
    }
    let Some(listener) = shared.message_listener() else {
        warn!(target: TCP_TARGET, %remote, "no message listener; dropping connection");
        return;
    };
    let Some(id) = shared.track(&stream) else {
        return;
    };

    let connection_shared = Arc::clone(shared);
    let spawned = thread::Builder::new()
        .name(format!("collector-tcp-connection-{id}"))
        .spawn(move || {
            connection::serve(stream, remote, &listener, &connection_shared);
            connection_shared.forget(id);
        });
    if let Err(error) = spawned {
        warn!(target: TCP_TARGET, %remote, %error, "failed to spawn connection thread");
        shared.forget(id);
    }
}

//! Line-delimited JSON frames exchanged with agents.

use std::io::{self, BufRead, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gate::{HandshakeDecision, HandshakeProperties};
use crate::transport::TransportError;

/// Upper bound on a single encoded frame, newline included.
pub(super) const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// A single protocol frame. Payloads travel as hex strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    /// Agent → collector: handshake properties. `null` is malformed.
    Handshake {
        /// Properties presented by the agent.
        #[serde(default)]
        properties: Option<HandshakeProperties>,
    },
    /// Collector → agent: handshake verdict.
    HandshakeResponse {
        /// Gate decision.
        decision: HandshakeDecision,
    },
    /// Agent → collector: one-way payload.
    Send {
        /// Encoded message.
        #[serde(with = "hex::serde")]
        payload: Vec<u8>,
    },
    /// Agent → collector: payload expecting a response.
    Request {
        /// Correlation id echoed in the response.
        id: u64,
        /// Encoded message.
        #[serde(with = "hex::serde")]
        payload: Vec<u8>,
    },
    /// Collector → agent: response to a request.
    Response {
        /// Correlation id of the request.
        id: u64,
        /// Encoded result.
        #[serde(with = "hex::serde")]
        payload: Vec<u8>,
    },
    /// Agent → collector: keep-alive.
    Ping {
        /// Agent event counter.
        id: i32,
    },
    /// Collector → agent: keep-alive acknowledgement.
    Pong {
        /// Echoed event counter.
        id: i32,
    },
}

#[derive(Debug, Error)]
pub(super) enum FrameError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("frame exceeds {max} byte limit")]
    TooLarge { max: usize },
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Reads the next non-blank frame. `Ok(None)` signals end of stream.
pub(super) fn read_frame<R: BufRead>(reader: &mut R) -> Result<Option<Frame>, FrameError> {
    let limit = u64::try_from(MAX_FRAME_BYTES).unwrap_or(u64::MAX).saturating_add(1);
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader.by_ref().take(limit).read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if line.len() > MAX_FRAME_BYTES {
            return Err(FrameError::TooLarge {
                max: MAX_FRAME_BYTES,
            });
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        return serde_json::from_slice(&line)
            .map(Some)
            .map_err(FrameError::Malformed);
    }
}

/// Serialises writes to one connection so concurrent replies never interleave.
#[derive(Debug)]
pub(super) struct FrameWriter {
    remote: SocketAddr,
    stream: Mutex<TcpStream>,
}

impl FrameWriter {
    pub(super) fn new(stream: TcpStream, remote: SocketAddr) -> Self {
        Self {
            remote,
            stream: Mutex::new(stream),
        }
    }

    pub(super) fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(frame)?;
        line.push(b'\n');
        let mut stream = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        stream
            .write_all(&line)
            .and_then(|()| stream.flush())
            .map_err(|source| TransportError::Write {
                remote: self.remote,
                source,
            })
    }
}

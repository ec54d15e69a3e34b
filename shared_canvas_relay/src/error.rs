// Error types for the relay crate.
//
// None of these terminate the relay loop. A `SendError` is local to one peer
// and gets that peer dropped. `LifecycleError` reports a transition the
// connection state machine refuses. `RelayError` only surfaces from
// `start_relay` before the loop exists. `ClientError` belongs to the
// blocking `CanvasClient`.

use std::io;
use std::net::SocketAddr;

use shared_canvas_protocol::ConnectionId;
use thiserror::Error;

/// Failure to start the relay.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A frame could not be queued for a peer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The writer thread has exited.
    #[error("outbound queue for connection {0} is closed")]
    Closed(ConnectionId),

    /// The peer has stopped draining its queue.
    #[error("outbound queue for connection {0} is full")]
    Full(ConnectionId),
}

/// A connection state transition that the state machine does not allow.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("connection {0} is not awaiting registration")]
    NotConnecting(ConnectionId),

    #[error("connection ids exhausted")]
    IdsExhausted,
}

/// Failure in the blocking test/demo client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),
}

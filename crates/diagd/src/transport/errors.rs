//! Error types for transport endpoints and the multiplexer.

use std::io;

use thiserror::Error;

/// Errors surfaced while binding endpoints or servicing connections.
///
/// Binding errors disable their port at start-up. Everything else is reported
/// through the multiplexer's error callback and retried on the next pass.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind unix listener at {path}: {source}")]
    BindUnix {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("existing unix socket {path} is already in use")]
    UnixInUse { path: String },
    #[error("unix socket path {path} is not a socket")]
    UnixNotSocket { path: String },
    #[error("failed to read metadata for unix socket {path}: {source}")]
    UnixMetadata {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to existing unix socket {path}: {source}")]
    UnixConnect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove stale unix socket {path}: {source}")]
    UnixCleanup {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to enable non-blocking mode: {source}")]
    NonBlocking {
        #[source]
        source: io::Error,
    },
    #[error("failed to accept connection on {path}: {source}")]
    Accept {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to dial {address}: {source}")]
    Dial {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send advertise handshake to {address}: {source}")]
    Handshake {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to probe cached connection to {address}: {source}")]
    Probe {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("poll failed: {source}")]
    Poll {
        #[source]
        source: io::Error,
    },
    #[error("failed to create multiplexer waker: {source}")]
    Waker {
        #[source]
        source: io::Error,
    },
}

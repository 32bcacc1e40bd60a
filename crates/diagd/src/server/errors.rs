use std::io;

use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while starting or stopping the server thread.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The multiplexer could not be created.
    #[error("failed to initialise the connection multiplexer: {0}")]
    Transport(#[from] TransportError),
    /// The server thread could not be spawned.
    #[error("failed to spawn the diagnostics server thread: {source}")]
    Spawn {
        #[source]
        source: io::Error,
    },
    /// The server thread panicked before it could be joined.
    #[error("diagnostics server thread panicked")]
    ThreadPanic,
}

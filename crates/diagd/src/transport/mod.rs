//! Local IPC transport.
//!
//! Endpoints are Unix domain sockets in one of two roles: listen sockets
//! that tools connect to, and reverse-connect addresses the server dials to
//! reach a waiting monitor. The [`ConnectionMultiplexer`] folds both into a
//! single blocking wait that yields streams with a request pending.

mod advertise;
mod backoff;
mod endpoint;
mod errors;
mod multiplexer;
mod stream;

pub use self::advertise::{ADVERTISE_MAGIC, ADVERTISE_SIZE, AdvertiseHandshake};
pub use self::backoff::PollBackoff;
pub use self::endpoint::{ConnectEndpoint, Dialer, Endpoint, ListenEndpoint, UnixDialer};
pub use self::errors::TransportError;
pub use self::multiplexer::{ConnectionMultiplexer, MultiplexerWaker, PollOutcome};
pub use self::stream::IpcStream;

const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

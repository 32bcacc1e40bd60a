//! Listen and reverse-connect endpoints.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};

use camino::{Utf8Path, Utf8PathBuf};
use diag_config::{PortConfig, PortMode};
use tracing::{debug, warn};

use super::advertise::AdvertiseHandshake;
use super::{IpcStream, TRANSPORT_TARGET, TransportError};

/// A configured endpoint, created once at start-up.
#[derive(Debug)]
pub enum Endpoint {
    /// Bound socket accepting tool connections.
    Listen(ListenEndpoint),
    /// Address the server dials to reach a waiting monitor.
    Connect(ConnectEndpoint),
}

impl Endpoint {
    /// Builds the endpoint for `port`, binding listen sockets immediately.
    ///
    /// # Errors
    ///
    /// Returns binding errors for listen ports. Connect ports never fail
    /// here; dial failures surface later and are retried.
    pub fn from_port(
        port: &PortConfig,
        handshake: AdvertiseHandshake,
        dialer: Box<dyn Dialer>,
    ) -> Result<Self, TransportError> {
        match port.mode() {
            PortMode::Listen => ListenEndpoint::bind(port.address()).map(Self::Listen),
            PortMode::Connect => Ok(Self::Connect(ConnectEndpoint::new(
                port.address(),
                handshake,
                dialer,
            ))),
        }
    }

    /// Socket path of the endpoint.
    #[must_use]
    pub fn address(&self) -> &Utf8Path {
        match self {
            Self::Listen(endpoint) => endpoint.address(),
            Self::Connect(endpoint) => endpoint.address(),
        }
    }

    /// Connection role of the endpoint.
    #[must_use]
    pub fn mode(&self) -> PortMode {
        match self {
            Self::Listen(_) => PortMode::Listen,
            Self::Connect(_) => PortMode::Connect,
        }
    }
}

/// Listening Unix socket. The socket file is removed on drop.
#[derive(Debug)]
pub struct ListenEndpoint {
    path: Utf8PathBuf,
    listener: UnixListener,
}

impl ListenEndpoint {
    /// Binds `path`, replacing a stale socket left by a dead process.
    ///
    /// # Errors
    ///
    /// Fails when the path is held by a live listener or is not a socket,
    /// or when binding or switching to non-blocking mode fails.
    pub fn bind(path: &Utf8Path) -> Result<Self, TransportError> {
        let listener = bind_unix(path)?;
        if let Err(source) = listener.set_nonblocking(true) {
            remove_socket_file(path);
            return Err(TransportError::NonBlocking { source });
        }
        debug!(target: TRANSPORT_TARGET, path = %path, "listen endpoint bound");
        Ok(Self {
            path: path.to_path_buf(),
            listener,
        })
    }

    /// Socket path.
    #[must_use]
    pub fn address(&self) -> &Utf8Path {
        &self.path
    }

    /// Accepts one pending connection without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Accept`] when `accept(2)` fails for a
    /// reason other than an empty backlog.
    pub fn accept(&self) -> Result<Option<IpcStream>, TransportError> {
        let accept_error = |source| TransportError::Accept {
            path: self.path.to_string(),
            source,
        };
        match self.listener.accept() {
            Ok((stream, _)) => IpcStream::from_unix(stream).map(Some).map_err(accept_error),
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(error) => Err(accept_error(error)),
        }
    }
}

impl AsFd for ListenEndpoint {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.listener.as_fd()
    }
}

impl Drop for ListenEndpoint {
    fn drop(&mut self) {
        remove_socket_file(&self.path);
    }
}

/// Opens outbound connections for reverse-connect endpoints.
pub trait Dialer: Send {
    /// Connects to the monitor listening at `address`.
    fn dial(&self, address: &Utf8Path) -> io::Result<IpcStream>;
}

/// Dials Unix domain sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixDialer;

impl Dialer for UnixDialer {
    fn dial(&self, address: &Utf8Path) -> io::Result<IpcStream> {
        IpcStream::from_unix(UnixStream::connect(address)?)
    }
}

/// Reverse-connect endpoint.
pub struct ConnectEndpoint {
    address: Utf8PathBuf,
    handshake: AdvertiseHandshake,
    dialer: Box<dyn Dialer>,
}

impl ConnectEndpoint {
    /// Creates an endpoint that dials `address` through `dialer`.
    #[must_use]
    pub fn new(
        address: impl Into<Utf8PathBuf>,
        handshake: AdvertiseHandshake,
        dialer: Box<dyn Dialer>,
    ) -> Self {
        Self {
            address: address.into(),
            handshake,
            dialer,
        }
    }

    /// Monitor address.
    #[must_use]
    pub fn address(&self) -> &Utf8Path {
        &self.address
    }

    /// Dials the monitor and sends the advertise handshake. The returned
    /// stream is ready to carry protocol messages.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Dial`] or [`TransportError::Handshake`].
    pub fn dial(&self) -> Result<IpcStream, TransportError> {
        let mut stream =
            self.dialer
                .dial(&self.address)
                .map_err(|source| TransportError::Dial {
                    address: self.address.to_string(),
                    source,
                })?;
        stream
            .write_all(&self.handshake.encode())
            .and_then(|()| stream.flush())
            .map_err(|source| TransportError::Handshake {
                address: self.address.to_string(),
                source,
            })?;
        Ok(stream)
    }
}

impl fmt::Debug for ConnectEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectEndpoint")
            .field("address", &self.address)
            .field("handshake", &self.handshake)
            .finish_non_exhaustive()
    }
}

fn bind_unix(path: &Utf8Path) -> Result<UnixListener, TransportError> {
    if path.exists() {
        let metadata = fs::symlink_metadata(path).map_err(|source| TransportError::UnixMetadata {
            path: path.to_string(),
            source,
        })?;
        if !metadata.file_type().is_socket() {
            return Err(TransportError::UnixNotSocket {
                path: path.to_string(),
            });
        }
        match UnixStream::connect(path) {
            Ok(_stream) => {
                return Err(TransportError::UnixInUse {
                    path: path.to_string(),
                });
            }
            Err(error)
                if error.kind() == io::ErrorKind::ConnectionRefused
                    || error.kind() == io::ErrorKind::NotFound =>
            {
                fs::remove_file(path).map_err(|source| TransportError::UnixCleanup {
                    path: path.to_string(),
                    source,
                })?;
            }
            Err(error) => {
                return Err(TransportError::UnixConnect {
                    path: path.to_string(),
                    source: error,
                });
            }
        }
    }

    UnixListener::bind(path).map_err(|source| TransportError::BindUnix {
        path: path.to_string(),
        source,
    })
}

fn remove_socket_file(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path)
        && error.kind() != io::ErrorKind::NotFound
    {
        warn!(
            target: TRANSPORT_TARGET,
            error = %error,
            path = %path,
            "failed to remove unix socket file"
        );
    }
}

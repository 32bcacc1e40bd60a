//! Connected byte stream handed between the multiplexer, dispatcher and
//! deferred actions.

use std::fmt;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{MsgFlags, recv};

/// A connected bidirectional channel to a diagnostic client.
///
/// Ownership is the close discipline: the stream is closed exactly once,
/// when its final owner drops it.
pub struct IpcStream {
    inner: UnixStream,
}

impl IpcStream {
    /// Wraps a connected Unix stream, switching it to blocking mode.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the mode cannot be changed.
    pub fn from_unix(inner: UnixStream) -> io::Result<Self> {
        inner.set_nonblocking(false)?;
        Ok(Self { inner })
    }

    /// Creates a connected pair of streams.
    ///
    /// # Errors
    ///
    /// Returns the error reported by `socketpair(2)`.
    pub fn pair() -> io::Result<(Self, Self)> {
        let (left, right) = UnixStream::pair()?;
        Ok((Self::from_unix(left)?, Self::from_unix(right)?))
    }

    /// Bounds every subsequent read and write. A stalled peer then surfaces
    /// as a `WouldBlock` or `TimedOut` error instead of blocking forever.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the socket rejects the timeout.
    pub fn set_io_timeout(&self, timeout: Duration) -> io::Result<()> {
        let timeout = Some(timeout).filter(|timeout| !timeout.is_zero());
        self.inner.set_read_timeout(timeout)?;
        self.inner.set_write_timeout(timeout)
    }

    /// Checks, without blocking, whether the peer has hung up.
    ///
    /// Pending unread data counts as live: the stream is only considered
    /// closed on end-of-file, `POLLHUP` or `POLLERR` with nothing to read.
    ///
    /// # Errors
    ///
    /// Returns errors from `poll(2)` or `recv(2)` other than interruption.
    pub fn is_peer_closed(&self) -> io::Result<bool> {
        let mut pollfds = [PollFd::new(self.inner.as_fd(), PollFlags::POLLIN)];
        match poll(&mut pollfds, PollTimeout::ZERO) {
            Ok(0) | Err(Errno::EINTR) => return Ok(false),
            Ok(_) => {}
            Err(errno) => return Err(errno.into()),
        }
        let revents = pollfds[0].revents().unwrap_or_else(PollFlags::empty);
        if revents.contains(PollFlags::POLLIN) {
            return self.peek_is_eof();
        }
        Ok(revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR))
    }

    fn peek_is_eof(&self) -> io::Result<bool> {
        let mut byte = [0_u8; 1];
        match recv(
            self.inner.as_raw_fd(),
            &mut byte,
            MsgFlags::MSG_PEEK | MsgFlags::MSG_DONTWAIT,
        ) {
            Ok(0) | Err(Errno::ECONNRESET | Errno::EPIPE) => Ok(true),
            Ok(_) | Err(Errno::EAGAIN | Errno::EINTR) => Ok(false),
            Err(errno) => Err(errno.into()),
        }
    }
}

impl AsFd for IpcStream {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inner.as_fd()
    }
}

impl fmt::Debug for IpcStream {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("IpcStream")
            .field("fd", &self.inner.as_raw_fd())
            .finish()
    }
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_peer_is_not_closed() {
        let (local, _peer) = IpcStream::pair().expect("pair");
        assert!(!local.is_peer_closed().expect("probe"));
    }

    #[test]
    fn pending_data_is_not_a_hangup() {
        let (local, mut peer) = IpcStream::pair().expect("pair");
        peer.write_all(b"x").expect("write");
        assert!(!local.is_peer_closed().expect("probe"));
    }

    #[test]
    fn dropped_peer_is_detected() {
        let (local, peer) = IpcStream::pair().expect("pair");
        drop(peer);
        assert!(local.is_peer_closed().expect("probe"));
    }

    #[test]
    fn io_timeout_bounds_a_stalled_read() {
        let (mut local, _peer) = IpcStream::pair().expect("pair");
        local
            .set_io_timeout(Duration::from_millis(20))
            .expect("set timeout");
        let mut buffer = [0_u8; 1];
        let error = local.read(&mut buffer).expect_err("read should time out");
        assert!(matches!(
            error.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ));
    }

    #[test]
    fn hangup_check_does_not_consume_data() {
        let (mut local, mut peer) = IpcStream::pair().expect("pair");
        peer.write_all(b"ab").expect("write");
        let _ = local.is_peer_closed().expect("probe");
        let mut buffer = [0_u8; 2];
        local.read_exact(&mut buffer).expect("read");
        assert_eq!(&buffer, b"ab");
    }
}

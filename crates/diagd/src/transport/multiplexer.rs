//! Multiplexes listen and reverse-connect endpoints onto one blocking wait.

use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::{debug, trace};

use diag_config::PollTimeouts;

use super::backoff::PollBackoff;
use super::endpoint::Endpoint;
use super::{IpcStream, TRANSPORT_TARGET, TransportError};

/// Result of one multiplexer pass.
#[derive(Debug)]
pub enum PollOutcome {
    /// A stream has a request waiting.
    Ready(IpcStream),
    /// [`MultiplexerWaker::wake`] interrupted the wait.
    Woken,
    /// The wait timed out with nothing to do.
    Idle,
}

/// Interrupts a blocked [`ConnectionMultiplexer`] from another thread.
#[derive(Debug, Clone)]
pub struct MultiplexerWaker {
    sender: Arc<UnixStream>,
}

impl MultiplexerWaker {
    /// Wakes the multiplexer. Wake-ups coalesce; a full pipe already
    /// guarantees a pending wake.
    pub fn wake(&self) {
        match (&*self.sender).write(&[1]) {
            Ok(_) => {}
            Err(error) if error.kind() == io::ErrorKind::WouldBlock => {}
            Err(error) => {
                debug!(target: TRANSPORT_TARGET, error = %error, "waker write failed");
            }
        }
    }
}

#[derive(Debug)]
struct ConnectionState {
    endpoint: Endpoint,
    cached: Option<IpcStream>,
    backoff: PollBackoff,
    accept_stalled: bool,
}

impl ConnectionState {
    fn new(endpoint: Endpoint, timeouts: PollTimeouts) -> Self {
        Self {
            endpoint,
            cached: None,
            backoff: PollBackoff::from(timeouts),
            accept_stalled: false,
        }
    }

    fn refresh(&mut self, on_error: &mut dyn FnMut(&TransportError)) {
        let Endpoint::Connect(endpoint) = &self.endpoint else {
            return;
        };
        if let Some(stream) = &self.cached {
            let closed = match stream.is_peer_closed() {
                Ok(closed) => closed,
                Err(source) => {
                    on_error(&TransportError::Probe {
                        address: endpoint.address().to_string(),
                        source,
                    });
                    true
                }
            };
            if closed {
                trace!(
                    target: TRANSPORT_TARGET,
                    address = %endpoint.address(),
                    "discarding hung-up connection"
                );
                self.cached = None;
                self.backoff.record_failure();
            }
            return;
        }
        match endpoint.dial() {
            Ok(stream) => {
                self.cached = Some(stream);
                self.backoff.record_success();
            }
            Err(error) => {
                on_error(&error);
                self.backoff.record_failure();
            }
        }
    }

    /// Descriptor to wait on. A listener whose last accept failed sits out
    /// one wait so a persistent failure cannot spin.
    fn poll_fd(&self) -> Option<BorrowedFd<'_>> {
        match &self.endpoint {
            Endpoint::Listen(endpoint) => (!self.accept_stalled).then(|| endpoint.as_fd()),
            Endpoint::Connect(_) => self.cached.as_ref().map(AsFd::as_fd),
        }
    }

    fn timeout(&self) -> Option<Duration> {
        match self.endpoint {
            Endpoint::Listen(_) => self.accept_stalled.then(|| self.backoff.current()),
            Endpoint::Connect(_) => Some(self.backoff.current()),
        }
    }

    fn record_accept_failure(&mut self) {
        self.accept_stalled = true;
        self.backoff.record_failure();
    }

    fn resume_accepting(&mut self) {
        self.accept_stalled = false;
    }

    /// Accepts every pending connection into `accepted`.
    fn accept_pending(
        &mut self,
        accepted: &mut Vec<IpcStream>,
        on_error: &mut dyn FnMut(&TransportError),
    ) {
        let Endpoint::Listen(endpoint) = &self.endpoint else {
            return;
        };
        loop {
            match endpoint.accept() {
                Ok(Some(stream)) => {
                    self.backoff.record_success();
                    accepted.push(stream);
                }
                Ok(None) => return,
                Err(error) => {
                    on_error(&error);
                    self.record_accept_failure();
                    return;
                }
            }
        }
    }

    fn take_cached(&mut self, revents: PollFlags) -> Option<IpcStream> {
        if revents.contains(PollFlags::POLLIN) {
            return self.cached.take();
        }
        if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR) {
            self.cached = None;
            self.backoff.record_failure();
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
enum Source {
    Waker,
    Connection(usize),
    Accepted(usize),
}

/// Owns every configured endpoint and hands out streams with a pending
/// request, dialing and re-dialing reverse-connect endpoints as needed.
///
/// Connections accepted on listen endpoints are held until they become
/// readable, so a silent client never reaches the dispatcher.
#[derive(Debug)]
pub struct ConnectionMultiplexer {
    connections: Vec<ConnectionState>,
    accepted: Vec<IpcStream>,
    waker_receiver: UnixStream,
    waker: MultiplexerWaker,
    error_pause: Duration,
}

impl ConnectionMultiplexer {
    /// Takes ownership of `endpoints`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Waker`] when the internal wake-up channel
    /// cannot be created.
    pub fn new(endpoints: Vec<Endpoint>, timeouts: PollTimeouts) -> Result<Self, TransportError> {
        let (sender, receiver) =
            UnixStream::pair().map_err(|source| TransportError::Waker { source })?;
        sender
            .set_nonblocking(true)
            .and_then(|()| receiver.set_nonblocking(true))
            .map_err(|source| TransportError::Waker { source })?;
        let connections = endpoints
            .into_iter()
            .map(|endpoint| ConnectionState::new(endpoint, timeouts))
            .collect();
        Ok(Self {
            connections,
            accepted: Vec::new(),
            waker_receiver: receiver,
            waker: MultiplexerWaker {
                sender: Arc::new(sender),
            },
            error_pause: timeouts.max,
        })
    }

    /// Handle that interrupts a blocked [`Self::next_ready_stream`].
    #[must_use]
    pub fn waker(&self) -> MultiplexerWaker {
        self.waker.clone()
    }

    /// Number of managed endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of accepted connections still waiting for their request.
    #[must_use]
    pub fn pending_connections(&self) -> usize {
        self.accepted.len()
    }

    /// Blocks until a stream has a request waiting, returning `None` when
    /// woken instead.
    pub fn next_ready_stream(
        &mut self,
        on_error: &mut dyn FnMut(&TransportError),
    ) -> Option<IpcStream> {
        loop {
            match self.poll_once(on_error) {
                PollOutcome::Ready(stream) => return Some(stream),
                PollOutcome::Woken => return None,
                PollOutcome::Idle => {}
            }
        }
    }

    /// Runs a single pass: refresh reverse-connect endpoints, wait for
    /// readiness, and hand back at most one stream.
    pub fn poll_once(&mut self, on_error: &mut dyn FnMut(&TransportError)) -> PollOutcome {
        for state in &mut self.connections {
            state.refresh(on_error);
        }

        let timeout = self
            .connections
            .iter()
            .filter_map(ConnectionState::timeout)
            .min();
        let events = match self.wait(timeout) {
            Ok(events) => events,
            Err(Errno::EINTR) => return PollOutcome::Idle,
            Err(errno) => {
                on_error(&TransportError::Poll {
                    source: errno.into(),
                });
                thread::sleep(timeout.unwrap_or(self.error_pause));
                return PollOutcome::Idle;
            }
        };
        for state in &mut self.connections {
            state.resume_accepting();
        }

        if events
            .iter()
            .any(|(source, _)| matches!(source, Source::Waker))
        {
            self.drain_waker();
            return PollOutcome::Woken;
        }

        let mut ready = self.take_readable_accepted(&events);
        for (source, revents) in events {
            let Source::Connection(index) = source else {
                continue;
            };
            let state = &mut self.connections[index];
            if matches!(state.endpoint, Endpoint::Listen(_)) {
                state.accept_pending(&mut self.accepted, on_error);
            } else if ready.is_none() {
                ready = state.take_cached(revents);
            }
        }
        ready.map_or(PollOutcome::Idle, PollOutcome::Ready)
    }

    /// Waits for readiness and returns the sources that reported events.
    fn wait(&self, timeout: Option<Duration>) -> nix::Result<Vec<(Source, PollFlags)>> {
        let mut sources = vec![Source::Waker];
        let mut pollfds = vec![PollFd::new(self.waker_receiver.as_fd(), PollFlags::POLLIN)];
        for (index, state) in self.connections.iter().enumerate() {
            if let Some(fd) = state.poll_fd() {
                sources.push(Source::Connection(index));
                pollfds.push(PollFd::new(fd, PollFlags::POLLIN));
            }
        }
        for (index, stream) in self.accepted.iter().enumerate() {
            sources.push(Source::Accepted(index));
            pollfds.push(PollFd::new(stream.as_fd(), PollFlags::POLLIN));
        }

        poll(&mut pollfds, poll_timeout(timeout))?;
        Ok(sources
            .into_iter()
            .zip(pollfds.iter().map(|pollfd| pollfd.revents().unwrap_or_else(PollFlags::empty)))
            .filter(|(_, revents)| !revents.is_empty())
            .collect())
    }

    /// Removes and returns the first accepted stream with data waiting,
    /// dropping accepted streams whose peer left without sending anything.
    fn take_readable_accepted(&mut self, events: &[(Source, PollFlags)]) -> Option<IpcStream> {
        let mut revents = vec![PollFlags::empty(); self.accepted.len()];
        for (source, flags) in events {
            if let Source::Accepted(index) = source {
                revents[*index] = *flags;
            }
        }

        let mut ready = None;
        for (stream, flags) in mem::take(&mut self.accepted).into_iter().zip(revents) {
            if ready.is_none() && flags.contains(PollFlags::POLLIN) {
                ready = Some(stream);
            } else if flags.intersects(PollFlags::POLLHUP | PollFlags::POLLERR)
                && !flags.contains(PollFlags::POLLIN)
            {
                trace!(target: TRANSPORT_TARGET, "dropping accepted connection closed before its request");
            } else {
                self.accepted.push(stream);
            }
        }
        ready
    }

    fn drain_waker(&mut self) {
        let mut buffer = [0_u8; 64];
        loop {
            match self.waker_receiver.read(&mut buffer) {
                Ok(0) => return,
                Ok(_) => {}
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return,
            }
        }
    }
}

/// Converts an optional wait into a `poll(2)` timeout. Waits too long for
/// the timeout type are cut short; the caller simply polls again.
fn poll_timeout(timeout: Option<Duration>) -> PollTimeout {
    timeout.map_or(PollTimeout::NONE, |timeout| {
        let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
        PollTimeout::from(millis)
    })
}

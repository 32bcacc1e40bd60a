//! Minimal diagnostics client used to drive a running server.

use std::io::Read;
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::{Duration, Instant};

use camino::Utf8Path;

use crate::protocol::{Command, DiagnosticStatus, IpcMessage, StatusReply, WirePayload};
use crate::transport::{ADVERTISE_SIZE, AdvertiseHandshake};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to a listen port.
#[must_use]
pub fn connect(path: &Utf8Path) -> UnixStream {
    let stream = UnixStream::connect(path).expect("connect to diagnostic port");
    with_timeouts(stream)
}

/// Applies read and write timeouts so a broken scenario fails instead of
/// hanging.
#[must_use]
pub fn with_timeouts(stream: UnixStream) -> UnixStream {
    stream
        .set_read_timeout(Some(IO_TIMEOUT))
        .expect("set read timeout");
    stream
        .set_write_timeout(Some(IO_TIMEOUT))
        .expect("set write timeout");
    stream
}

/// Sends a payload-less command.
pub fn send_empty(stream: &mut UnixStream, command: Command) {
    IpcMessage::new(command.header(), Vec::new())
        .expect("request message")
        .write_to(stream)
        .expect("write request");
}

/// Sends `payload` as `command`.
pub fn send<P: WirePayload>(stream: &mut UnixStream, command: Command, payload: &P) {
    IpcMessage::with_payload(command.header(), payload)
        .expect("request message")
        .write_to(stream)
        .expect("write request");
}

/// Reads one reply.
#[must_use]
pub fn read_reply(stream: &mut UnixStream) -> IpcMessage {
    IpcMessage::read_from(stream).expect("read reply")
}

/// Reads a status reply, returning whether it was an OK reply and its code.
#[must_use]
pub fn read_status(stream: &mut UnixStream) -> (bool, DiagnosticStatus) {
    let reply = read_reply(stream);
    let status: StatusReply = reply.parse_payload().expect("status payload");
    (reply.header().is_ok_reply(), status.0)
}

/// Reads the handshake a reverse connection opens with.
#[must_use]
pub fn read_advertise(stream: &mut UnixStream) -> AdvertiseHandshake {
    let mut bytes = [0_u8; ADVERTISE_SIZE];
    stream.read_exact(&mut bytes).expect("read advertise handshake");
    AdvertiseHandshake::decode(&bytes).expect("valid advertise handshake")
}

/// Polls `condition` until it holds or five seconds pass.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + IO_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

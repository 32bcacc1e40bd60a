//! Reply encoding for the dispatch loop.

use std::io::Write;

use crate::protocol::{
    DiagnosticStatus, IpcMessage, ProcessInfo, SessionReply, StatusReply, send_error,
};

use super::errors::DispatchError;

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `OK` carrying a u32 status.
    Status(DiagnosticStatus),
    /// `OK` carrying a u64 trace session id.
    Session(u64),
    /// `OK` carrying the process description.
    Process(ProcessInfo),
}

/// Writes framed replies to a stream. Each write flushes.
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: Write> ResponseWriter<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a success reply. A reply too large to encode is replaced by a
    /// `FAIL` error reply so the client is still answered.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Encode`] after sending the fallback reply,
    /// or [`DispatchError::Reply`] when writing fails.
    pub fn write_reply(&mut self, reply: &Reply) -> Result<(), DispatchError> {
        let encoded = match reply {
            Reply::Status(status) => IpcMessage::ok(&StatusReply(*status)),
            Reply::Session(session_id) => IpcMessage::ok(&SessionReply(*session_id)),
            Reply::Process(info) => IpcMessage::ok(info),
        };
        match encoded {
            Ok(message) => message
                .write_to(&mut self.writer)
                .map_err(DispatchError::Reply),
            Err(source) => {
                let error = DispatchError::Encode(source);
                self.write_error(&error)?;
                Err(error)
            }
        }
    }

    /// Writes the error reply for `error`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Reply`] when writing fails.
    pub fn write_error(&mut self, error: &DispatchError) -> Result<(), DispatchError> {
        send_error(&mut self.writer, error.status()).map_err(DispatchError::Reply)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use uuid::Uuid;

    use super::*;
    use crate::protocol::{Command, WirePayload};

    fn decode(bytes: Vec<u8>) -> IpcMessage {
        IpcMessage::read_from(&mut Cursor::new(bytes)).expect("decode reply")
    }

    fn payload<P: WirePayload>(message: &IpcMessage) -> P {
        message.parse_payload().expect("typed payload")
    }

    #[test]
    fn writes_status_reply() {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_reply(&Reply::Status(DiagnosticStatus::OK))
            .expect("write");
        let message = decode(output);
        assert!(message.header().is_ok_reply());
        assert_eq!(payload::<StatusReply>(&message).0, DiagnosticStatus::OK);
    }

    #[test]
    fn writes_session_reply() {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_reply(&Reply::Session(77))
            .expect("write");
        assert_eq!(payload::<SessionReply>(&decode(output)).0, 77);
    }

    #[test]
    fn writes_process_reply() {
        let info = ProcessInfo {
            process_id: 1,
            runtime_cookie: Uuid::from_u128(2),
            command_line: "app".to_owned(),
            os: "Linux".to_owned(),
            arch: "x64".to_owned(),
        };
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_reply(&Reply::Process(info.clone()))
            .expect("write");
        assert_eq!(payload::<ProcessInfo>(&decode(output)), info);
    }

    #[test]
    fn oversized_reply_falls_back_to_failure() {
        let info = ProcessInfo {
            process_id: 1,
            runtime_cookie: Uuid::from_u128(2),
            command_line: "x".repeat(40_000),
            os: "Linux".to_owned(),
            arch: "x64".to_owned(),
        };
        let mut output = Vec::new();
        let error = ResponseWriter::new(&mut output)
            .write_reply(&Reply::Process(info))
            .expect_err("reply cannot be encoded");
        assert!(matches!(error, DispatchError::Encode(_)));

        let message = decode(output);
        assert!(message.header().is_error_reply());
        assert_eq!(payload::<StatusReply>(&message).0, DiagnosticStatus::FAIL);
    }

    #[test]
    fn write_error_uses_error_status() {
        let mut output = Vec::new();
        ResponseWriter::new(&mut output)
            .write_error(&DispatchError::bad_payload(Command::CollectTracing))
            .expect("write");
        let message = decode(output);
        assert!(message.header().is_error_reply());
        assert_eq!(
            payload::<StatusReply>(&message).0,
            DiagnosticStatus::BAD_ENCODING
        );
    }
}

//! Framed messages: header plus opaque payload.

use std::io::{self, Read, Write};

use super::cursor::PayloadCursor;
use super::errors::ProtocolError;
use super::header::{HEADER_SIZE, IpcHeader, MAX_PAYLOAD_SIZE};
use super::payloads::{StatusReply, WirePayload};
use super::status::DiagnosticStatus;
use super::writer::PayloadWriter;

/// A complete message. The payload stays opaque until a handler asks for a
/// typed view with [`IpcMessage::parse_payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpcMessage {
    header: IpcHeader,
    payload: Vec<u8>,
}

impl IpcMessage {
    /// Builds a message, fixing up the header's size field.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] when header and payload do
    /// not fit the 16-bit size field.
    pub fn new(mut header: IpcHeader, payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        header.size = u16::try_from(HEADER_SIZE + payload.len()).map_err(|_| {
            ProtocolError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            }
        })?;
        Ok(Self { header, payload })
    }

    /// Builds a message from a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] when the encoding is too
    /// large for one message.
    pub fn with_payload<P: WirePayload>(
        header: IpcHeader,
        payload: &P,
    ) -> Result<Self, ProtocolError> {
        let mut writer = PayloadWriter::new();
        payload.encode(&mut writer);
        Self::new(header, writer.into_bytes())
    }

    /// Success reply carrying a typed payload.
    ///
    /// # Errors
    ///
    /// See [`IpcMessage::with_payload`].
    pub fn ok<P: WirePayload>(payload: &P) -> Result<Self, ProtocolError> {
        Self::with_payload(IpcHeader::ok_reply(), payload)
    }

    /// Error reply carrying a status code.
    #[must_use]
    pub fn error(status: DiagnosticStatus) -> Self {
        let mut writer = PayloadWriter::new();
        StatusReply(status).encode(&mut writer);
        Self {
            header: IpcHeader {
                size: (HEADER_SIZE + writer.len()) as u16,
                ..IpcHeader::error_reply()
            },
            payload: writer.into_bytes(),
        }
    }

    /// Reads one message: exactly one header, then exactly the payload it
    /// declares. The magic is deliberately not validated here.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] on a short read,
    /// [`ProtocolError::UndersizedMessage`] when the size field is below the
    /// header width, [`ProtocolError::Allocation`] when the payload buffer
    /// cannot be reserved, or [`ProtocolError::Io`] for other read failures.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let mut header_bytes = [0_u8; HEADER_SIZE];
        read_full(reader, &mut header_bytes)?;
        let header = IpcHeader::decode(&header_bytes).ok_or(ProtocolError::Truncated {
            expected: HEADER_SIZE,
            received: header_bytes.len(),
        })?;
        let payload_len = header
            .payload_len()
            .ok_or(ProtocolError::UndersizedMessage { size: header.size })?;

        let mut payload = Vec::new();
        if payload_len > 0 {
            payload
                .try_reserve_exact(payload_len)
                .map_err(|_| ProtocolError::Allocation { len: payload_len })?;
            payload.resize(payload_len, 0);
            read_full(reader, &mut payload)?;
        }
        Ok(Self { header, payload })
    }

    /// Encodes header then payload into one contiguous buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PayloadWriter::new();
        self.header.encode_into(&mut writer);
        writer.write_bytes(&self.payload);
        writer.into_bytes()
    }

    /// Writes the encoded message and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Io`] when writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&self.encode())?;
        writer.flush()?;
        Ok(())
    }

    /// Message header.
    #[must_use]
    pub fn header(&self) -> &IpcHeader {
        &self.header
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parses the payload as `P`. Parsing is all-or-nothing: `None` means
    /// the payload was truncated or carried an out-of-range field.
    #[must_use]
    pub fn parse_payload<P: WirePayload>(&self) -> Option<P> {
        P::decode(&mut PayloadCursor::new(&self.payload))
    }
}

/// Writes an error reply and closes the stream by consuming it, whether or
/// not the write succeeded.
pub fn send_error<S: Write>(mut stream: S, status: DiagnosticStatus) -> Result<(), ProtocolError> {
    IpcMessage::error(status).write_to(&mut stream)
}

fn read_full<R: Read>(reader: &mut R, buffer: &mut [u8]) -> Result<(), ProtocolError> {
    let mut received = 0;
    while received < buffer.len() {
        match reader.read(&mut buffer[received..]) {
            Ok(0) => {
                return Err(ProtocolError::Truncated {
                    expected: buffer.len(),
                    received,
                });
            }
            Ok(read) => received += read,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(ProtocolError::Io(error)),
        }
    }
    Ok(())
}

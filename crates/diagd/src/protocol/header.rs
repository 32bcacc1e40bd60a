//! Fixed-size message header.

use std::fmt;

use super::cursor::PayloadCursor;
use super::writer::PayloadWriter;

/// Magic tag identifying version 1 of the protocol.
pub const IPC_MAGIC: [u8; 14] = *b"DOTNET_IPC_V1\0";

/// Encoded header width in bytes.
pub const HEADER_SIZE: usize = 20;

/// Largest payload a single message can carry.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - HEADER_SIZE;

/// Feature area addressed by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandSet {
    /// Core dump generation and dump triggers.
    Dump = 0x01,
    /// Trace session control.
    EventPipe = 0x02,
    /// Profiler attach.
    Profiler = 0x03,
    /// Process information and start-up control.
    Process = 0x04,
    /// Protocol-level replies.
    Server = 0xFF,
}

impl CommandSet {
    /// Maps a raw command-set byte.
    #[must_use]
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Dump),
            0x02 => Some(Self::EventPipe),
            0x03 => Some(Self::Profiler),
            0x04 => Some(Self::Process),
            0xFF => Some(Self::Server),
            _ => None,
        }
    }

    /// Raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CommandSet {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Dump => "dump",
            Self::EventPipe => "eventpipe",
            Self::Profiler => "profiler",
            Self::Process => "process",
            Self::Server => "server",
        };
        formatter.write_str(label)
    }
}

/// Command ids used under [`CommandSet::Server`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerCommandId {
    /// Successful reply.
    Ok = 0x00,
    /// Error reply carrying a status code.
    Error = 0xFF,
}

/// Message header as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcHeader {
    /// Protocol version tag.
    pub magic: [u8; 14],
    /// Header plus payload length in bytes.
    pub size: u16,
    /// Raw command-set byte.
    pub command_set: u8,
    /// Raw command-id byte.
    pub command_id: u8,
    /// Reserved, zero when sent.
    pub reserved: u16,
}

impl IpcHeader {
    /// Builds a header for a payload-less message with the current magic.
    #[must_use]
    pub fn new(command_set: u8, command_id: u8) -> Self {
        Self {
            magic: IPC_MAGIC,
            size: HEADER_SIZE as u16,
            command_set,
            command_id,
            reserved: 0,
        }
    }

    /// Header for a protocol-level success reply.
    #[must_use]
    pub fn ok_reply() -> Self {
        Self::new(CommandSet::Server.as_byte(), ServerCommandId::Ok as u8)
    }

    /// Header for a protocol-level error reply.
    #[must_use]
    pub fn error_reply() -> Self {
        Self::new(CommandSet::Server.as_byte(), ServerCommandId::Error as u8)
    }

    /// Decodes a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut cursor = PayloadCursor::new(bytes);
        let magic = <[u8; 14]>::try_from(cursor.try_parse_bytes(IPC_MAGIC.len())?).ok()?;
        Some(Self {
            magic,
            size: cursor.try_parse()?,
            command_set: cursor.try_parse()?,
            command_id: cursor.try_parse()?,
            reserved: cursor.try_parse()?,
        })
    }

    /// Appends the encoded header.
    pub fn encode_into(&self, writer: &mut PayloadWriter) {
        writer
            .write_bytes(&self.magic)
            .write(self.size)
            .write(self.command_set)
            .write(self.command_id)
            .write(self.reserved);
    }

    /// Returns `true` when the magic matches [`IPC_MAGIC`].
    #[must_use]
    pub fn has_valid_magic(&self) -> bool {
        self.magic == IPC_MAGIC
    }

    /// Payload length implied by `size`, or `None` when `size` is smaller
    /// than the header itself.
    #[must_use]
    pub fn payload_len(&self) -> Option<usize> {
        usize::from(self.size).checked_sub(HEADER_SIZE)
    }

    /// Returns `true` for a protocol-level success reply.
    #[must_use]
    pub fn is_ok_reply(&self) -> bool {
        self.command_set == CommandSet::Server.as_byte()
            && self.command_id == ServerCommandId::Ok as u8
    }

    /// Returns `true` for a protocol-level error reply.
    #[must_use]
    pub fn is_error_reply(&self) -> bool {
        self.command_set == CommandSet::Server.as_byte()
            && self.command_id == ServerCommandId::Error as u8
    }
}

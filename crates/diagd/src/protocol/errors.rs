//! Error types for message framing.

use std::io;

use thiserror::Error;

/// Errors surfaced while reading or writing framed messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the stream before a full header or payload arrived.
    #[error("stream ended after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    /// The header's size field is smaller than the header itself.
    #[error("declared message size {size} is smaller than the header")]
    UndersizedMessage { size: u16 },

    /// An outgoing payload does not fit the 16-bit size field.
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    /// The payload buffer could not be allocated.
    #[error("failed to allocate {len} byte payload buffer")]
    Allocation { len: usize },

    /// IO error during read or write.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

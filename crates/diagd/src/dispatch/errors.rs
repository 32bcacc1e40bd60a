//! Error types for command dispatch failures.
//!
//! Every variant maps to the status code sent back in the error reply, so a
//! client can tell an envelope problem from a payload problem from a runtime
//! refusal.

use thiserror::Error;

use crate::protocol::{Command, DiagnosticStatus, ProtocolError};
use crate::runtime::RuntimeError;
use crate::triggers::TriggerError;

/// Errors surfaced while decoding, routing or executing a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request could not be framed.
    #[error("failed to read request: {0}")]
    Read(#[source] ProtocolError),

    /// The header magic is not a supported protocol version.
    #[error("unknown protocol magic {magic:02x?}")]
    UnknownMagic { magic: [u8; 14] },

    /// The opcode pair does not name a known command.
    #[error("unknown command {command_set:#04x}/{command_id:#04x}")]
    UnknownCommand { command_set: u8, command_id: u8 },

    /// The payload does not decode as the command's request type.
    #[error("malformed payload for {command}")]
    BadPayload { command: Command },

    /// A trigger condition was rejected.
    #[error("invalid trigger condition: {0}")]
    InvalidCondition(#[from] TriggerError),

    /// No pending trigger carries the identity.
    #[error("no pending trigger named {identity:?}")]
    TriggerNotFound { identity: String },

    /// A runtime collaborator refused or failed the request.
    #[error("{command} failed: {source}")]
    Runtime {
        command: Command,
        #[source]
        source: RuntimeError,
    },

    /// The success reply could not be encoded.
    #[error("failed to encode reply: {0}")]
    Encode(#[source] ProtocolError),

    /// The reply could not be written.
    #[error("failed to write reply: {0}")]
    Reply(#[source] ProtocolError),
}

impl DispatchError {
    /// Status code sent in the error reply.
    #[must_use]
    pub fn status(&self) -> DiagnosticStatus {
        match self {
            Self::Read(_) | Self::BadPayload { .. } => DiagnosticStatus::BAD_ENCODING,
            Self::UnknownMagic { .. } => DiagnosticStatus::UNKNOWN_MAGIC,
            Self::UnknownCommand { .. } => DiagnosticStatus::UNKNOWN_COMMAND,
            Self::InvalidCondition(_) => DiagnosticStatus::INVALID_ARGUMENT,
            Self::TriggerNotFound { .. } => DiagnosticStatus::NOT_FOUND,
            Self::Runtime { source, .. } => source.status(),
            Self::Encode(_) | Self::Reply(_) => DiagnosticStatus::FAIL,
        }
    }

    /// Creates a malformed payload error.
    pub fn bad_payload(command: Command) -> Self {
        Self::BadPayload { command }
    }

    /// Creates a runtime failure error.
    pub fn runtime(command: Command, source: RuntimeError) -> Self {
        Self::Runtime { command, source }
    }

    /// Creates a missing trigger error.
    pub fn trigger_not_found(identity: impl Into<String>) -> Self {
        Self::TriggerNotFound {
            identity: identity.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DispatchError::UnknownMagic { magic: [0; 14] }, DiagnosticStatus::UNKNOWN_MAGIC)]
    #[case(
        DispatchError::UnknownCommand { command_set: 9, command_id: 9 },
        DiagnosticStatus::UNKNOWN_COMMAND
    )]
    #[case(DispatchError::bad_payload(Command::StopTracing), DiagnosticStatus::BAD_ENCODING)]
    #[case(
        DispatchError::InvalidCondition(TriggerError::MissingProperty { name: "when" }),
        DiagnosticStatus::INVALID_ARGUMENT
    )]
    #[case(DispatchError::trigger_not_found("x"), DiagnosticStatus::NOT_FOUND)]
    #[case(
        DispatchError::runtime(
            Command::AttachProfiler,
            RuntimeError::new(DiagnosticStatus::PROFILER_ALREADY_ACTIVE, "busy"),
        ),
        DiagnosticStatus::PROFILER_ALREADY_ACTIVE
    )]
    fn maps_errors_to_status(#[case] error: DispatchError, #[case] expected: DiagnosticStatus) {
        assert_eq!(error.status(), expected);
    }
}

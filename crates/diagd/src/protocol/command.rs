//! Two-level opcode mapping.

use std::fmt;

use super::header::{CommandSet, IpcHeader};

/// Every request the server understands, keyed by `(command_set, command_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Write a core dump now.
    GenerateCoreDump,
    /// Write a core dump now, or when a trigger condition is met.
    GenerateCoreDump2,
    /// Cancel a pending dump trigger by identity.
    CancelDumpTrigger,
    /// Stop a trace session.
    StopTracing,
    /// Start a trace session.
    CollectTracing,
    /// Start a trace session with rundown control.
    CollectTracing2,
    /// Load a profiler into the running process.
    AttachProfiler,
    /// Describe the process.
    ProcessInfo,
    /// Release a runtime paused at start-up.
    ResumeRuntime,
}

impl Command {
    /// Every command, in wire order.
    pub const ALL: [Self; 9] = [
        Self::GenerateCoreDump,
        Self::GenerateCoreDump2,
        Self::CancelDumpTrigger,
        Self::StopTracing,
        Self::CollectTracing,
        Self::CollectTracing2,
        Self::AttachProfiler,
        Self::ProcessInfo,
        Self::ResumeRuntime,
    ];

    /// Maps a raw opcode pair; `None` for anything unrecognised, including
    /// [`CommandSet::Server`] which only carries replies.
    #[must_use]
    pub fn from_opcode(command_set: u8, command_id: u8) -> Option<Self> {
        match (CommandSet::from_byte(command_set)?, command_id) {
            (CommandSet::Dump, 0x01) => Some(Self::GenerateCoreDump),
            (CommandSet::Dump, 0x02) => Some(Self::GenerateCoreDump2),
            (CommandSet::Dump, 0x03) => Some(Self::CancelDumpTrigger),
            (CommandSet::EventPipe, 0x01) => Some(Self::StopTracing),
            (CommandSet::EventPipe, 0x02) => Some(Self::CollectTracing),
            (CommandSet::EventPipe, 0x03) => Some(Self::CollectTracing2),
            (CommandSet::Profiler, 0x01) => Some(Self::AttachProfiler),
            (CommandSet::Process, 0x00) => Some(Self::ProcessInfo),
            (CommandSet::Process, 0x01) => Some(Self::ResumeRuntime),
            _ => None,
        }
    }

    /// Maps the opcode carried by `header`.
    #[must_use]
    pub fn from_header(header: &IpcHeader) -> Option<Self> {
        Self::from_opcode(header.command_set, header.command_id)
    }

    /// Command set the command belongs to.
    #[must_use]
    pub const fn command_set(self) -> CommandSet {
        match self {
            Self::GenerateCoreDump | Self::GenerateCoreDump2 | Self::CancelDumpTrigger => {
                CommandSet::Dump
            }
            Self::StopTracing | Self::CollectTracing | Self::CollectTracing2 => {
                CommandSet::EventPipe
            }
            Self::AttachProfiler => CommandSet::Profiler,
            Self::ProcessInfo | Self::ResumeRuntime => CommandSet::Process,
        }
    }

    /// Command id within the set.
    #[must_use]
    pub const fn command_id(self) -> u8 {
        match self {
            Self::ProcessInfo => 0x00,
            Self::GenerateCoreDump
            | Self::StopTracing
            | Self::AttachProfiler
            | Self::ResumeRuntime => 0x01,
            Self::GenerateCoreDump2 | Self::CollectTracing => 0x02,
            Self::CancelDumpTrigger | Self::CollectTracing2 => 0x03,
        }
    }

    /// Request header for this command with an empty payload.
    #[must_use]
    pub fn header(self) -> IpcHeader {
        IpcHeader::new(self.command_set().as_byte(), self.command_id())
    }

    /// Canonical name used in log events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenerateCoreDump => "generate-core-dump",
            Self::GenerateCoreDump2 => "generate-core-dump2",
            Self::CancelDumpTrigger => "cancel-dump-trigger",
            Self::StopTracing => "stop-tracing",
            Self::CollectTracing => "collect-tracing",
            Self::CollectTracing2 => "collect-tracing2",
            Self::AttachProfiler => "attach-profiler",
            Self::ProcessInfo => "process-info",
            Self::ResumeRuntime => "resume-runtime",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn opcode_mapping_round_trips_for_every_command() {
        for command in Command::ALL {
            assert_eq!(
                Command::from_opcode(command.command_set().as_byte(), command.command_id()),
                Some(command),
                "{command}"
            );
        }
    }

    #[rstest]
    #[case(0x00, 0x00)]
    #[case(0x01, 0x7F)]
    #[case(0x05, 0x00)]
    #[case(0xFF, 0x00)]
    #[case(0xFF, 0xFF)]
    fn unknown_opcodes_are_rejected(#[case] command_set: u8, #[case] command_id: u8) {
        assert_eq!(Command::from_opcode(command_set, command_id), None);
    }
}

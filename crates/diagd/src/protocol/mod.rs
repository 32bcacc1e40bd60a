//! Wire protocol for the diagnostic IPC channel.
//!
//! Messages are a fixed 20-byte header followed by a little-endian payload.
//! Strings are length-prefixed UTF-16 with a trailing NUL; GUIDs use the
//! mixed-endian Windows layout.

mod command;
mod cursor;
mod errors;
mod header;
mod message;
mod payloads;
mod status;
mod writer;

pub use command::Command;
pub use cursor::{CODE_UNIT_SIZE, GUID_SIZE, PayloadCursor, WideStr, WirePrimitive};
pub use errors::ProtocolError;
pub use header::{CommandSet, HEADER_SIZE, IPC_MAGIC, IpcHeader, MAX_PAYLOAD_SIZE, ServerCommandId};
pub use message::{IpcMessage, send_error};
pub use payloads::{
    AttachProfilerRequest, CancelTriggerRequest, CollectTracing2Request, CollectTracingRequest,
    DumpRequest, DumpType, MAX_EVENT_LEVEL, ProcessInfo, ProviderConfig, SessionReply,
    StatusReply, StopTracingRequest, TriggeredDumpRequest, WirePayload,
};
pub use status::DiagnosticStatus;
pub use writer::PayloadWriter;

//! Runtime collaborators the diagnostic server drives.
//!
//! The server does not generate dumps, run trace sessions or load profilers
//! itself; the embedding runtime supplies those capabilities through the
//! traits below, bundled in [`RuntimeServices`].

mod host;
#[cfg(test)]
pub(crate) mod mocks;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{
    AttachProfilerRequest, CollectTracing2Request, DiagnosticStatus, DumpRequest, ProcessInfo,
};
use crate::transport::AdvertiseHandshake;

pub use self::host::HostRuntime;

/// Failure reported by a collaborator, carrying the status the client sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({status})")]
pub struct RuntimeError {
    status: DiagnosticStatus,
    message: String,
}

impl RuntimeError {
    /// Creates an error with an explicit status.
    pub fn new(status: DiagnosticStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// The runtime cannot perform `operation` at all.
    pub fn not_implemented(operation: &str) -> Self {
        Self::new(
            DiagnosticStatus::NOT_IMPLEMENTED,
            format!("{operation} is not supported by this runtime"),
        )
    }

    /// Status reported to the client.
    #[must_use]
    pub fn status(&self) -> DiagnosticStatus {
        self.status
    }

    /// Human-readable detail for logs.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Writes core dumps of the running process.
pub trait DumpGenerator: Send + Sync {
    /// Writes a dump as described by `request`.
    fn generate(&self, request: &DumpRequest) -> Result<(), RuntimeError>;
}

/// Starts and stops trace sessions.
pub trait TraceSessions: Send + Sync {
    /// Starts a session, returning its id.
    fn start(&self, request: &CollectTracing2Request) -> Result<u64, RuntimeError>;

    /// Stops the session `session_id`, returning the id that was stopped.
    fn stop(&self, session_id: u64) -> Result<u64, RuntimeError>;
}

/// Loads profilers into the running process.
pub trait ProfilerAttacher: Send + Sync {
    /// Attaches the profiler described by `request`.
    fn attach(&self, request: &AttachProfilerRequest) -> Result<(), RuntimeError>;
}

/// Describes the host process.
pub trait ProcessIntrospector: Send + Sync {
    /// Current process details.
    fn describe(&self) -> ProcessDetails;
}

/// Process details not fixed at start-up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessDetails {
    /// Full command line.
    pub command_line: String,
    /// Operating system name.
    pub os: String,
    /// Processor architecture name.
    pub arch: String,
}

/// Identity of this runtime instance, fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeIdentity {
    /// Random cookie distinguishing this instance from a recycled pid.
    pub cookie: Uuid,
    /// Operating system process id.
    pub process_id: u64,
}

impl RuntimeIdentity {
    /// Identity for the current process with a fresh random cookie.
    #[must_use]
    pub fn current() -> Self {
        Self {
            cookie: Uuid::new_v4(),
            process_id: u64::from(std::process::id()),
        }
    }

    /// Handshake sent when dialing a monitor.
    #[must_use]
    pub fn handshake(&self) -> AdvertiseHandshake {
        AdvertiseHandshake::new(self.cookie, self.process_id)
    }

    /// Combines the identity with current process details.
    #[must_use]
    pub fn process_info(&self, details: ProcessDetails) -> ProcessInfo {
        ProcessInfo {
            process_id: self.process_id,
            runtime_cookie: self.cookie,
            command_line: details.command_line,
            os: details.os,
            arch: details.arch,
        }
    }
}

/// The collaborators a server is wired to.
#[derive(Clone)]
pub struct RuntimeServices {
    /// Core dump writer.
    pub dumps: Arc<dyn DumpGenerator>,
    /// Trace session control.
    pub tracing: Arc<dyn TraceSessions>,
    /// Profiler loader.
    pub profiler: Arc<dyn ProfilerAttacher>,
    /// Process description.
    pub process: Arc<dyn ProcessIntrospector>,
}

impl RuntimeServices {
    /// Uses one object for every collaborator.
    pub fn from_runtime<R>(runtime: Arc<R>) -> Self
    where
        R: DumpGenerator + TraceSessions + ProfilerAttacher + ProcessIntrospector + 'static,
    {
        Self {
            dumps: runtime.clone(),
            tracing: runtime.clone(),
            profiler: runtime.clone(),
            process: runtime,
        }
    }
}

impl fmt::Debug for RuntimeServices {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("RuntimeServices").finish_non_exhaustive()
    }
}

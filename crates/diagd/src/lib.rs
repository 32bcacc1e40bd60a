//! Diagnostics IPC server for a managed runtime.
//!
//! External tools (trace collectors, dump collectors, profiler attachers)
//! reach a running process through local Unix domain sockets and a small
//! binary framing protocol. This crate provides:
//!
//! - the [`protocol`] codec: the 20-byte header, typed request and reply
//!   payloads, and the bounds-checked cursor every peer-controlled length
//!   goes through;
//! - the [`transport`]: listen sockets, reverse-connect ports that dial a
//!   waiting monitor and advertise this process, and the multiplexer that
//!   folds them into one blocking wait with adaptive retry;
//! - the [`dispatch`] layer: envelope checks, command routing and error
//!   replies;
//! - the [`triggers`] registry: dumps deferred until the runtime reports a
//!   matching GC event.
//!
//! The runtime's own capabilities are injected through the traits in
//! [`runtime`]. [`bootstrap_with`] loads configuration, initialises
//! telemetry and opens the configured ports; [`Daemon::start`] then serves
//! them on a background thread supervised by a [`DiagnosticServer`].
//!
//! ## Start-up pause
//!
//! A port tagged `suspend` asks the runtime to hold start-up until a monitor
//! connects and sends `ResumeRuntime`. Hosts call
//! [`DiagnosticServer::pause_for_diagnostics_monitor`] at the point where
//! start-up should wait.

mod bootstrap;
mod context;
pub mod dispatch;
mod health;
mod process;
pub mod protocol;
pub mod runtime;
mod server;
mod startup;
mod telemetry;
pub mod transport;
pub mod triggers;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, EndpointSetupError, StaticConfigLoader,
    SystemConfigLoader, bootstrap_with,
};
pub use context::ServerContext;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_server, run_server_with,
};
pub use server::{DiagnosticServer, RESUME_REMINDER_INTERVAL, ServerError};
pub use startup::StartupGate;
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;

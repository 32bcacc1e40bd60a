//! Profiler command set.

use tracing::info;

use crate::context::ServerContext;
use crate::protocol::{AttachProfilerRequest, Command, DiagnosticStatus, IpcMessage};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::response::Reply;
use super::router::RouteOutcome;

pub(super) fn attach(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: AttachProfilerRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::AttachProfiler))?;
    context
        .services()
        .profiler
        .attach(&request)
        .map_err(|source| DispatchError::runtime(Command::AttachProfiler, source))?;
    info!(
        target: DISPATCH_TARGET,
        profiler = %request.profiler_guid,
        path = %request.profiler_path,
        timeout_ms = request.attach_timeout_ms,
        "profiler attached"
    );
    Ok(RouteOutcome::Reply(Reply::Status(DiagnosticStatus::OK)))
}

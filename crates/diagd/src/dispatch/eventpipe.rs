//! EventPipe command set: trace session start and stop.

use tracing::info;

use crate::context::ServerContext;
use crate::protocol::{
    CollectTracing2Request, CollectTracingRequest, Command, IpcMessage, StopTracingRequest,
};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::response::Reply;
use super::router::RouteOutcome;

pub(super) fn collect(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: CollectTracingRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::CollectTracing))?;
    start_session(context, &request.into(), Command::CollectTracing)
}

pub(super) fn collect_v2(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: CollectTracing2Request = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::CollectTracing2))?;
    start_session(context, &request, Command::CollectTracing2)
}

pub(super) fn stop(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: StopTracingRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::StopTracing))?;
    let session_id = context
        .services()
        .tracing
        .stop(request.session_id)
        .map_err(|source| DispatchError::runtime(Command::StopTracing, source))?;
    info!(target: DISPATCH_TARGET, session_id, "trace session stopped");
    Ok(RouteOutcome::Reply(Reply::Session(session_id)))
}

fn start_session(
    context: &ServerContext,
    request: &CollectTracing2Request,
    command: Command,
) -> Result<RouteOutcome, DispatchError> {
    let session_id = context
        .services()
        .tracing
        .start(request)
        .map_err(|source| DispatchError::runtime(command, source))?;
    info!(
        target: DISPATCH_TARGET,
        session_id,
        providers = request.providers.len(),
        buffer_mb = request.circular_buffer_mb,
        rundown = request.request_rundown,
        "trace session started"
    );
    Ok(RouteOutcome::Reply(Reply::Session(session_id)))
}

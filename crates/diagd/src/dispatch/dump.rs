//! Dump command set: immediate dumps, deferred dump triggers and their
//! cancellation.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use crate::context::ServerContext;
use crate::protocol::{
    CancelTriggerRequest, Command, DiagnosticStatus, DumpRequest, IpcMessage, TriggeredDumpRequest,
    send_error,
};
use crate::runtime::DumpGenerator;
use crate::transport::IpcStream;
use crate::triggers::{TriggerAction, TriggerScope};

use super::DISPATCH_TARGET;
use super::errors::DispatchError;
use super::response::{Reply, ResponseWriter};
use super::router::RouteOutcome;

pub(super) fn generate(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: DumpRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::GenerateCoreDump))?;
    write_dump(context.services().dumps.as_ref(), &request, Command::GenerateCoreDump)
        .map(RouteOutcome::Reply)
}

pub(super) fn generate_v2(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: TriggeredDumpRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::GenerateCoreDump2))?;
    if request.is_deferred() {
        return Ok(RouteOutcome::DeferDump(request));
    }
    write_dump(
        context.services().dumps.as_ref(),
        &request.dump,
        Command::GenerateCoreDump2,
    )
    .map(RouteOutcome::Reply)
}

pub(super) fn cancel_trigger(
    context: &ServerContext,
    message: &IpcMessage,
) -> Result<RouteOutcome, DispatchError> {
    let request: CancelTriggerRequest = message
        .parse_payload()
        .ok_or_else(|| DispatchError::bad_payload(Command::CancelDumpTrigger))?;
    if context.triggers().unregister(&request.identity) {
        Ok(RouteOutcome::Reply(Reply::Status(DiagnosticStatus::OK)))
    } else {
        Err(DispatchError::trigger_not_found(request.identity))
    }
}

/// Registers a deferred dump that replies on `stream` once it runs or is
/// cancelled. A rejected condition is answered immediately.
pub(super) fn register_trigger(
    context: &ServerContext,
    request: TriggeredDumpRequest,
    stream: IpcStream,
) {
    let action = Arc::new(DumpTriggerAction::new(
        Arc::clone(&context.services().dumps),
        request.dump,
        stream,
    ));
    let registered = context.triggers().register(
        &request.condition,
        &request.identity,
        Arc::clone(&action) as Arc<dyn TriggerAction>,
    );
    if let Err(error) = registered {
        let error = DispatchError::from(error);
        warn!(
            target: DISPATCH_TARGET,
            identity = %request.identity,
            error = %error,
            "rejected dump trigger"
        );
        if let Some(mut stream) = action.take_stream()
            && let Err(reply_error) = ResponseWriter::new(&mut stream).write_error(&error)
        {
            debug!(target: DISPATCH_TARGET, error = %reply_error, "failed to reply");
        }
    }
}

fn write_dump(
    dumps: &dyn DumpGenerator,
    request: &DumpRequest,
    command: Command,
) -> Result<Reply, DispatchError> {
    dumps
        .generate(request)
        .map_err(|source| DispatchError::runtime(command, source))?;
    info!(
        target: DISPATCH_TARGET,
        dump_name = %request.dump_name,
        dump_type = ?request.dump_type,
        "core dump written"
    );
    Ok(Reply::Status(DiagnosticStatus::OK))
}

/// Deferred dump owning the requester's stream until it replies.
struct DumpTriggerAction {
    dumps: Arc<dyn DumpGenerator>,
    request: DumpRequest,
    stream: Mutex<Option<IpcStream>>,
}

impl DumpTriggerAction {
    fn new(dumps: Arc<dyn DumpGenerator>, request: DumpRequest, stream: IpcStream) -> Self {
        Self {
            dumps,
            request,
            stream: Mutex::new(Some(stream)),
        }
    }

    fn take_stream(&self) -> Option<IpcStream> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl TriggerAction for DumpTriggerAction {
    fn run(&self, scope: TriggerScope<'_>) {
        scope.retire();
        let Some(mut stream) = self.take_stream() else {
            return;
        };
        let mut writer = ResponseWriter::new(&mut stream);
        let written = match write_dump(self.dumps.as_ref(), &self.request, Command::GenerateCoreDump2)
        {
            Ok(reply) => writer.write_reply(&reply),
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    identity = scope.identity(),
                    error = %error,
                    "triggered dump failed"
                );
                writer.write_error(&error)
            }
        };
        if let Err(error) = written {
            debug!(target: DISPATCH_TARGET, error = %error, "failed to reply");
        }
    }

    fn cancel(&self) {
        if let Some(stream) = self.take_stream()
            && let Err(error) = send_error(stream, DiagnosticStatus::ABORTED)
        {
            debug!(target: DISPATCH_TARGET, error = %error, "failed to reply");
        }
    }
}

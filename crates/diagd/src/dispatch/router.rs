//! Command routing.
//!
//! Every [`Command`] maps to exactly one handler; the match below is total,
//! so adding a command without a handler fails to compile.

use std::sync::Arc;

use tracing::debug;

use crate::context::ServerContext;
use crate::protocol::{Command, IpcMessage, TriggeredDumpRequest};

use super::errors::DispatchError;
use super::response::Reply;
use super::{DISPATCH_TARGET, dump, eventpipe, process, profiler};

/// What the dispatcher does with the stream after routing.
#[derive(Debug)]
pub enum RouteOutcome {
    /// Write the reply and close.
    Reply(Reply),
    /// Hand the stream to a deferred dump trigger without replying.
    DeferDump(TriggeredDumpRequest),
}

/// Routes decoded commands to their handlers.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    context: Arc<ServerContext>,
}

impl CommandRouter {
    /// Creates a router over the shared server context.
    #[must_use]
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    /// Shared server context.
    #[must_use]
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Runs the handler for `command`.
    ///
    /// # Errors
    ///
    /// Returns a [`DispatchError`] when the payload is malformed or the
    /// runtime refuses the request.
    pub fn route(
        &self,
        command: Command,
        message: &IpcMessage,
    ) -> Result<RouteOutcome, DispatchError> {
        debug!(
            target: DISPATCH_TARGET,
            command = command.as_str(),
            payload_len = message.payload().len(),
            "routing command"
        );
        let context = self.context.as_ref();
        match command {
            Command::GenerateCoreDump => dump::generate(context, message),
            Command::GenerateCoreDump2 => dump::generate_v2(context, message),
            Command::CancelDumpTrigger => dump::cancel_trigger(context, message),
            Command::StopTracing => eventpipe::stop(context, message),
            Command::CollectTracing => eventpipe::collect(context, message),
            Command::CollectTracing2 => eventpipe::collect_v2(context, message),
            Command::AttachProfiler => profiler::attach(context, message),
            Command::ProcessInfo => Ok(process::info(context)),
            Command::ResumeRuntime => Ok(process::resume_runtime(context)),
        }
    }
}

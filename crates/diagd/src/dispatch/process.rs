//! Process command set: process description and start-up resume.

use tracing::info;

use crate::context::ServerContext;
use crate::protocol::DiagnosticStatus;

use super::DISPATCH_TARGET;
use super::response::Reply;
use super::router::RouteOutcome;

pub(super) fn info(context: &ServerContext) -> RouteOutcome {
    let details = context.services().process.describe();
    RouteOutcome::Reply(Reply::Process(context.identity().process_info(details)))
}

pub(super) fn resume_runtime(context: &ServerContext) -> RouteOutcome {
    if context.startup().resume() {
        info!(target: DISPATCH_TARGET, "runtime start-up resumed by monitor");
    }
    RouteOutcome::Reply(Reply::Status(DiagnosticStatus::OK))
}

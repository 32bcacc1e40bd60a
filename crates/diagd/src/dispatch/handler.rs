//! Per-connection request handling.
//!
//! Each ready stream carries exactly one request. The dispatcher reads it,
//! checks the envelope, routes it, and then either replies and closes the
//! stream or hands the stream to a deferred trigger.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::context::ServerContext;
use crate::protocol::{Command, IpcMessage};
use crate::transport::IpcStream;

use super::errors::DispatchError;
use super::response::ResponseWriter;
use super::router::{CommandRouter, RouteOutcome};
use super::{DISPATCH_TARGET, dump};

/// Serves one request per stream.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    router: CommandRouter,
    request_timeout: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher over the shared server context. Reads and
    /// writes on a dispatched stream give up after `request_timeout`; zero
    /// means no limit.
    #[must_use]
    pub fn new(context: Arc<ServerContext>, request_timeout: Duration) -> Self {
        Self {
            router: CommandRouter::new(context),
            request_timeout,
        }
    }

    /// Handles the request waiting on `stream`. A panic inside a handler is
    /// logged and the stream dropped; it never reaches the caller.
    pub fn dispatch(&self, stream: IpcStream) {
        if panic::catch_unwind(AssertUnwindSafe(|| self.serve(stream))).is_err() {
            error!(target: DISPATCH_TARGET, "request handler panicked; connection dropped");
        }
    }

    fn serve(&self, mut stream: IpcStream) {
        if let Err(error) = stream.set_io_timeout(self.request_timeout) {
            debug!(target: DISPATCH_TARGET, %error, "failed to bound connection timeouts");
        }
        let message = match IpcMessage::read_from(&mut stream) {
            Ok(message) => message,
            Err(source) => {
                let error = DispatchError::Read(source);
                warn!(target: DISPATCH_TARGET, %error, "unreadable request");
                reply_error(&mut stream, &error);
                return;
            }
        };

        let command = match command_for(&message) {
            Ok(command) => command,
            Err(error) => {
                warn!(target: DISPATCH_TARGET, %error, "rejected request envelope");
                reply_error(&mut stream, &error);
                return;
            }
        };

        debug!(target: DISPATCH_TARGET, command = command.as_str(), "dispatching request");
        match self.router.route(command, &message) {
            Ok(RouteOutcome::Reply(reply)) => {
                if let Err(error) = ResponseWriter::new(&mut stream).write_reply(&reply) {
                    warn!(target: DISPATCH_TARGET, %error, "failed to write reply");
                }
            }
            Ok(RouteOutcome::DeferDump(request)) => {
                dump::register_trigger(self.router.context(), request, stream);
            }
            Err(error) => {
                warn!(
                    target: DISPATCH_TARGET,
                    command = command.as_str(),
                    %error,
                    status = %error.status(),
                    "request failed"
                );
                reply_error(&mut stream, &error);
            }
        }
    }
}

fn command_for(message: &IpcMessage) -> Result<Command, DispatchError> {
    let header = message.header();
    if !header.has_valid_magic() {
        return Err(DispatchError::UnknownMagic {
            magic: header.magic,
        });
    }
    Command::from_header(header).ok_or(DispatchError::UnknownCommand {
        command_set: header.command_set,
        command_id: header.command_id,
    })
}

fn reply_error(stream: &mut IpcStream, error: &DispatchError) {
    if let Err(reply_error) = ResponseWriter::new(stream).write_error(error) {
        debug!(target: DISPATCH_TARGET, error = %reply_error, "failed to write error reply");
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::Shutdown;
    use std::os::unix::net::UnixStream;

    use rstest::{fixture, rstest};
    use uuid::Uuid;

    use super::*;
    use crate::protocol::{
        CancelTriggerRequest, DiagnosticStatus, DumpRequest, DumpType, IpcHeader, StatusReply,
        TriggeredDumpRequest,
    };
    use crate::runtime::{ProcessDetails, ProcessIntrospector, RuntimeIdentity, RuntimeServices};
    use crate::runtime::mocks::MockRuntime;
    use crate::triggers::GcMarkEvent;

    const GEN2_CONDITION: &str = "when=ongcmarkcomplete,gen=2,promoted_bytes_threshold=1000";
    const REQUEST_TIMEOUT: Duration = Duration::from_millis(50);

    struct PanickingIntrospector;

    impl ProcessIntrospector for PanickingIntrospector {
        fn describe(&self) -> ProcessDetails {
            panic!("introspection failure");
        }
    }

    fn build_dispatcher(runtime: MockRuntime) -> (Dispatcher, Arc<ServerContext>) {
        dispatcher_over(runtime.into_services())
    }

    fn dispatcher_over(services: RuntimeServices) -> (Dispatcher, Arc<ServerContext>) {
        let identity = RuntimeIdentity {
            cookie: Uuid::from_u128(1),
            process_id: 1,
        };
        let context = Arc::new(ServerContext::new(identity, services, false));
        (Dispatcher::new(Arc::clone(&context), REQUEST_TIMEOUT), context)
    }

    fn connection() -> (UnixStream, IpcStream) {
        let (client, server) = UnixStream::pair().expect("socket pair");
        (client, IpcStream::from_unix(server).expect("server stream"))
    }

    fn send(client: &mut UnixStream, message: &IpcMessage) {
        client.write_all(&message.encode()).expect("write request");
    }

    fn read_status(client: &mut UnixStream) -> (bool, DiagnosticStatus) {
        let reply = IpcMessage::read_from(client).expect("read reply");
        let status: StatusReply = reply.parse_payload().expect("status payload");
        (reply.header().is_ok_reply(), status.0)
    }

    fn deferred_dump(identity: &str, condition: &str) -> IpcMessage {
        let payload = TriggeredDumpRequest {
            dump: DumpRequest {
                dump_name: "/tmp/triggered.dmp".to_owned(),
                dump_type: DumpType::Full,
                flags: 0,
            },
            condition: condition.to_owned(),
            identity: identity.to_owned(),
        };
        IpcMessage::with_payload(Command::GenerateCoreDump2.header(), &payload).expect("message")
    }

    #[fixture]
    fn runtime() -> MockRuntime {
        MockRuntime::new()
    }

    #[rstest]
    fn wrong_magic_is_rejected(runtime: MockRuntime) {
        let (dispatcher, _) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        let header = IpcHeader {
            magic: *b"DOTNET_IPC_V2\0",
            ..Command::ProcessInfo.header()
        };
        send(&mut client, &IpcMessage::new(header, Vec::new()).expect("message"));

        dispatcher.dispatch(server);
        assert_eq!(
            read_status(&mut client),
            (false, DiagnosticStatus::UNKNOWN_MAGIC)
        );
    }

    #[rstest]
    fn unknown_opcode_is_rejected(runtime: MockRuntime) {
        let (dispatcher, _) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        send(
            &mut client,
            &IpcMessage::new(IpcHeader::new(0x04, 0x7F), Vec::new()).expect("message"),
        );

        dispatcher.dispatch(server);
        assert_eq!(
            read_status(&mut client),
            (false, DiagnosticStatus::UNKNOWN_COMMAND)
        );
    }

    #[rstest]
    fn truncated_header_is_bad_encoding(runtime: MockRuntime) {
        let (dispatcher, _) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        client.write_all(b"DOTNET_IPC").expect("write fragment");
        client.shutdown(Shutdown::Write).expect("half close");

        dispatcher.dispatch(server);
        assert_eq!(
            read_status(&mut client),
            (false, DiagnosticStatus::BAD_ENCODING)
        );
    }

    #[rstest]
    fn stalled_header_times_out_as_bad_encoding(runtime: MockRuntime) {
        let (dispatcher, _) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        client.write_all(b"DOTNET_IPC").expect("write fragment");

        dispatcher.dispatch(server);
        assert_eq!(
            read_status(&mut client),
            (false, DiagnosticStatus::BAD_ENCODING)
        );
    }

    #[rstest]
    fn oversized_process_info_is_answered_with_failure(mut runtime: MockRuntime) {
        runtime.process.expect_describe().returning(|| ProcessDetails {
            command_line: "x".repeat(40_000),
            os: "Linux".to_owned(),
            arch: "x64".to_owned(),
        });
        let (dispatcher, _) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        send(
            &mut client,
            &IpcMessage::new(Command::ProcessInfo.header(), Vec::new()).expect("message"),
        );

        dispatcher.dispatch(server);
        assert_eq!(read_status(&mut client), (false, DiagnosticStatus::FAIL));
    }

    #[rstest]
    fn deferred_dump_replies_when_condition_fires(mut runtime: MockRuntime) {
        runtime
            .dumps
            .expect_generate()
            .withf(|request| request.dump_type == DumpType::Full)
            .times(1)
            .returning(|_| Ok(()));
        let (dispatcher, context) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        send(&mut client, &deferred_dump("gc", GEN2_CONDITION));

        dispatcher.dispatch(server);
        assert_eq!(context.triggers().len(), 1);

        let below_threshold = GcMarkEvent {
            generation: 2,
            promoted_bytes: 10,
        };
        assert_eq!(context.triggers().on_gc_mark_complete(&below_threshold), 0);

        let event = GcMarkEvent {
            generation: 2,
            promoted_bytes: 1000,
        };
        assert_eq!(context.triggers().on_gc_mark_complete(&event), 1);
        assert_eq!(read_status(&mut client), (true, DiagnosticStatus::OK));
        assert!(context.triggers().is_empty());

        let mut rest = Vec::new();
        client.read_to_end(&mut rest).expect("read to end");
        assert!(rest.is_empty(), "stream closes after the reply");
    }

    #[rstest]
    fn cancelled_trigger_aborts_waiting_client(runtime: MockRuntime) {
        let (dispatcher, context) = build_dispatcher(runtime);
        let (mut waiting, first) = connection();
        send(&mut waiting, &deferred_dump("hunt", GEN2_CONDITION));
        dispatcher.dispatch(first);

        let (mut canceller, second) = connection();
        let cancel = CancelTriggerRequest {
            identity: "hunt".to_owned(),
        };
        send(
            &mut canceller,
            &IpcMessage::with_payload(Command::CancelDumpTrigger.header(), &cancel)
                .expect("message"),
        );
        dispatcher.dispatch(second);

        assert_eq!(read_status(&mut canceller), (true, DiagnosticStatus::OK));
        assert_eq!(read_status(&mut waiting), (false, DiagnosticStatus::ABORTED));
        assert!(context.triggers().is_empty());
    }

    #[rstest]
    fn invalid_condition_is_answered_immediately(runtime: MockRuntime) {
        let (dispatcher, context) = build_dispatcher(runtime);
        let (mut client, server) = connection();
        send(&mut client, &deferred_dump("bad", "when=ongcmarkcomplete,gen=two"));

        dispatcher.dispatch(server);
        assert_eq!(
            read_status(&mut client),
            (false, DiagnosticStatus::INVALID_ARGUMENT)
        );
        assert!(context.triggers().is_empty());
    }

    #[rstest]
    fn handler_panic_is_contained(runtime: MockRuntime) {
        let mut services = runtime.into_services();
        services.process = Arc::new(PanickingIntrospector);
        let (dispatcher, _) = dispatcher_over(services);
        let (mut client, server) = connection();
        send(
            &mut client,
            &IpcMessage::new(Command::ProcessInfo.header(), Vec::new()).expect("message"),
        );

        dispatcher.dispatch(server);
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).expect("read to end");
        assert!(rest.is_empty(), "panicking handler closes without a reply");
    }
}

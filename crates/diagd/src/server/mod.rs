//! Server lifecycle: the background thread that feeds ready streams from the
//! multiplexer into the dispatcher, and the handle that stops it.

mod errors;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use diag_config::PollTimeouts;

use crate::context::ServerContext;
use crate::dispatch::Dispatcher;
use crate::health::HealthReporter;
use crate::transport::{ConnectionMultiplexer, Endpoint, MultiplexerWaker, TransportError};
use crate::triggers::TriggerRegistry;

pub use self::errors::ServerError;

const SERVER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::server");
const THREAD_NAME: &str = "diagd-server";

/// Interval between reminders while start-up waits for a monitor.
pub const RESUME_REMINDER_INTERVAL: Duration = Duration::from_secs(5);

/// A running diagnostics server.
///
/// Dropping the server signals its thread to stop without waiting for it;
/// call [`DiagnosticServer::shutdown`] to stop and join.
#[derive(Debug)]
pub struct DiagnosticServer {
    context: Arc<ServerContext>,
    handle: ServerHandle,
}

impl DiagnosticServer {
    /// Takes ownership of `endpoints` and starts serving them on a
    /// background thread. Each dispatched connection may stall a read or
    /// write for at most `request_timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the multiplexer or thread cannot be
    /// created. The endpoints are dropped (and listen sockets unlinked) in
    /// that case.
    pub fn start(
        context: Arc<ServerContext>,
        endpoints: Vec<Endpoint>,
        timeouts: PollTimeouts,
        request_timeout: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, ServerError> {
        let multiplexer = ConnectionMultiplexer::new(endpoints, timeouts)?;
        let waker = multiplexer.waker();
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = ServerLoop {
            multiplexer,
            dispatcher: Dispatcher::new(Arc::clone(&context), request_timeout),
            triggers: Arc::clone(context.triggers()),
            shutdown: Arc::clone(&shutdown),
            reporter,
        };
        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || worker.run())
            .map_err(|source| ServerError::Spawn { source })?;

        Ok(Self {
            context,
            handle: ServerHandle {
                shutdown,
                waker,
                thread: Some(thread),
            },
        })
    }

    /// Shared server context.
    #[must_use]
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Registry the runtime signals when a GC mark phase completes.
    #[must_use]
    pub fn triggers(&self) -> &Arc<TriggerRegistry> {
        self.context.triggers()
    }

    /// Blocks the calling thread until a monitor sends `ResumeRuntime`.
    /// Returns immediately when no configured port asked for a pause.
    pub fn pause_for_diagnostics_monitor(&self) {
        let startup = self.context.startup();
        if !startup.is_paused() {
            return;
        }
        info!(
            target: SERVER_TARGET,
            process_id = self.context.identity().process_id,
            "start-up paused until a diagnostics monitor resumes the runtime"
        );
        startup.wait(RESUME_REMINDER_INTERVAL, |waited| {
            warn!(
                target: SERVER_TARGET,
                waited_secs = waited.as_secs(),
                "still waiting for a diagnostics monitor to resume the runtime"
            );
        });
        info!(target: SERVER_TARGET, "start-up resumed");
    }

    /// Stops the server thread and waits for it to exit. Pending triggers
    /// are cancelled and listen sockets removed before this returns, and a
    /// start-up still paused for a monitor is released.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ThreadPanic`] when the thread panicked.
    pub fn shutdown(self) -> Result<(), ServerError> {
        self.context.startup().resume();
        self.handle.shutdown();
        self.handle.join()
    }
}

/// Handle to the background server thread.
#[derive(Debug)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    waker: MultiplexerWaker,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Asks the thread to stop, interrupting any blocked wait.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.waker.wake();
    }

    /// Waits for the thread to exit.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::ThreadPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), ServerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| ServerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct ServerLoop {
    multiplexer: ConnectionMultiplexer,
    dispatcher: Dispatcher,
    triggers: Arc<TriggerRegistry>,
    shutdown: Arc<AtomicBool>,
    reporter: Arc<dyn HealthReporter>,
}

impl ServerLoop {
    fn run(mut self) {
        self.reporter.server_started(self.multiplexer.endpoint_count());
        let mut errors = TransportErrorLog::new(Arc::clone(&self.reporter));

        while !self.shutdown.load(Ordering::SeqCst) {
            let ready = self
                .multiplexer
                .next_ready_stream(&mut |error| errors.report(error));
            if let Some(stream) = ready {
                errors.clear();
                self.dispatcher.dispatch(stream);
            }
        }

        let cancelled = self.triggers.shutdown();
        drop(self.multiplexer);
        self.reporter.server_stopped(cancelled);
    }
}

/// Forwards transport errors to the reporter, suppressing back-to-back
/// repeats of the same failure until a stream is served.
struct TransportErrorLog {
    reporter: Arc<dyn HealthReporter>,
    last: Option<String>,
}

impl TransportErrorLog {
    fn new(reporter: Arc<dyn HealthReporter>) -> Self {
        Self {
            reporter,
            last: None,
        }
    }

    fn report(&mut self, error: &TransportError) {
        let rendered = error.to_string();
        if self.last.as_deref() != Some(rendered.as_str()) {
            self.reporter.transport_error(error);
            self.last = Some(rendered);
        }
    }

    fn clear(&mut self) {
        self.last = None;
    }
}


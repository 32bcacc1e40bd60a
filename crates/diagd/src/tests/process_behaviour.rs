//! Host process supervision scenarios.

use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use rstest::rstest;

use crate::protocol::{Command, DiagnosticStatus};
use crate::runtime::mocks::MockRuntime;
use crate::{ShutdownError, ShutdownSignal, run_server_with};

use super::support::{
    HealthEvent, RecordingHealthReporter, SocketDir, connect, read_status, send_empty, wait_until,
};

/// Signal that has already fired.
struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        Ok(())
    }
}

/// Signal that fires once the sender is dropped.
struct ChannelShutdown(Mutex<mpsc::Receiver<()>>);

impl ShutdownSignal for ChannelShutdown {
    fn wait(&self) -> Result<(), ShutdownError> {
        let receiver = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        receiver.recv().ok();
        Ok(())
    }
}

#[rstest]
fn shutdown_signal_interrupts_suspended_startup() {
    let sockets = SocketDir::new();
    let loader = sockets.loader("{dir}/diag.sock,listen,suspend");
    let reporter = Arc::new(RecordingHealthReporter::default());
    let (done_tx, done_rx) = mpsc::channel();

    let runner = {
        let reporter = Arc::clone(&reporter);
        thread::spawn(move || {
            let result = run_server_with(
                &loader,
                reporter,
                MockRuntime::new().into_services(),
                &ImmediateShutdown,
            );
            done_tx.send(result.is_ok()).ok();
        })
    };

    let finished = done_rx.recv_timeout(Duration::from_secs(5));
    assert_eq!(finished, Ok(true), "suspended server should stop on signal");
    runner.join().expect("runner thread");
    assert!(!sockets.path("diag.sock").exists(), "listen socket is unlinked");
    assert!(reporter.events().contains(&HealthEvent::ServerStopped(0)));
}

#[rstest]
fn resumed_server_runs_until_signalled() {
    let sockets = SocketDir::new();
    let loader = sockets.loader("{dir}/diag.sock,listen,suspend");
    let (signal_tx, signal_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();

    let runner = thread::spawn(move || {
        let shutdown = ChannelShutdown(Mutex::new(signal_rx));
        let result = run_server_with(
            &loader,
            Arc::new(RecordingHealthReporter::default()),
            MockRuntime::new().into_services(),
            &shutdown,
        );
        done_tx.send(result.is_ok()).ok();
    });

    let path = sockets.path("diag.sock");
    assert!(wait_until(|| path.exists()));
    let mut client = connect(&path);
    send_empty(&mut client, Command::ResumeRuntime);
    assert_eq!(read_status(&mut client), (true, DiagnosticStatus::OK));
    assert!(
        done_rx.recv_timeout(Duration::from_millis(100)).is_err(),
        "server keeps running after resume"
    );

    drop(signal_tx);
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    runner.join().expect("runner thread");
}

//! Host process supervision: bootstrap, serve, wait for a termination
//! signal, shut down.

mod shutdown;

use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::info;

use crate::bootstrap::{BootstrapError, ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::runtime::{HostRuntime, RuntimeServices};
use crate::server::ServerError;

pub use self::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};

const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors surfaced while running the host process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The server thread failed to start or stop.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// Waiting for a shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Runs the server with the production collaborators until a termination
/// signal arrives.
pub fn run_server() -> Result<(), LaunchError> {
    let shutdown = SystemShutdownSignal::install()?;
    run_server_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        RuntimeServices::from_runtime(Arc::new(HostRuntime)),
        &shutdown,
    )
}

/// Runs the server with injected collaborators.
///
/// The shutdown signal is watched from the moment the server starts, so a
/// termination request also releases a start-up still paused for a monitor.
pub fn run_server_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    services: RuntimeServices,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let daemon = bootstrap_with(loader, reporter)?;
    let server = daemon.start(services)?;
    let context = Arc::clone(server.context());

    let waited = thread::scope(|scope| {
        let watcher = scope.spawn(move || {
            let waited = shutdown.wait();
            if context.startup().resume() {
                info!(target: PROCESS_TARGET, "shutdown requested while start-up was paused");
            }
            waited
        });
        server.pause_for_diagnostics_monitor();
        info!(target: PROCESS_TARGET, "diagnostics server running");
        watcher.join()
    });

    server.shutdown()?;
    waited.map_err(|_| ShutdownError::WatcherPanic)??;
    info!(target: PROCESS_TARGET, "diagnostics server exited");
    Ok(())
}

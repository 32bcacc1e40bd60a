//! Structured health reporting for server lifecycle events.

use std::sync::Arc;

use diag_config::{Config, PortConfig};

use crate::bootstrap::{BootstrapError, EndpointSetupError};
use crate::transport::{Endpoint, TransportError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once a configured port is ready for use.
    fn endpoint_ready(&self, endpoint: &Endpoint);

    /// Invoked when a configured port cannot be opened; the server runs
    /// without it.
    fn endpoint_failed(&self, port: &PortConfig, error: &EndpointSetupError);

    /// Invoked when the server thread begins polling.
    fn server_started(&self, endpoints: usize);

    /// Invoked after the server thread exits.
    fn server_stopped(&self, cancelled_triggers: usize);

    /// Invoked for recoverable transport failures. Repeats of the same
    /// failure are suppressed by the caller until something succeeds.
    fn transport_error(&self, error: &TransportError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn endpoint_ready(&self, endpoint: &Endpoint) {
        (**self).endpoint_ready(endpoint);
    }

    fn endpoint_failed(&self, port: &PortConfig, error: &EndpointSetupError) {
        (**self).endpoint_failed(port, error);
    }

    fn server_started(&self, endpoints: usize) {
        (**self).server_started(endpoints);
    }

    fn server_stopped(&self, cancelled_triggers: usize) {
        (**self).server_stopped(cancelled_triggers);
    }

    fn transport_error(&self, error: &TransportError) {
        (**self).transport_error(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting diagnostics server bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            diagnostic_ports = %config.diagnostic_ports,
            default_port = !config.disable_default_port,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            "diagnostics server bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "diagnostics server bootstrap failed"
        );
    }

    fn endpoint_ready(&self, endpoint: &Endpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "endpoint_ready",
            address = %endpoint.address(),
            mode = %endpoint.mode(),
            "diagnostic port ready"
        );
    }

    fn endpoint_failed(&self, port: &PortConfig, error: &EndpointSetupError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "endpoint_failed",
            address = %port.address(),
            mode = %port.mode(),
            error = %error,
            "unable to create diagnostic port"
        );
    }

    fn server_started(&self, endpoints: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_started",
            endpoints,
            "diagnostics server started"
        );
    }

    fn server_stopped(&self, cancelled_triggers: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "server_stopped",
            cancelled_triggers,
            "diagnostics server stopped"
        );
    }

    fn transport_error(&self, error: &TransportError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "transport_error",
            error = %error,
            "diagnostic transport error"
        );
    }
}

//! Test double for [`HealthReporter`] that records structured events.

use std::sync::Mutex;

use diag_config::{Config, PortConfig, PortMode};

use crate::bootstrap::{BootstrapError, EndpointSetupError};
use crate::health::HealthReporter;
use crate::transport::{Endpoint, TransportError};

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    EndpointReady { address: String, mode: PortMode },
    EndpointFailed { address: String },
    ServerStarted(usize),
    ServerStopped(usize),
    TransportError(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    /// Counts recorded transport errors.
    #[must_use]
    pub fn transport_errors(&self) -> usize {
        self.events()
            .iter()
            .filter(|event| matches!(event, HealthEvent::TransportError(_)))
            .count()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn endpoint_ready(&self, endpoint: &Endpoint) {
        self.record(HealthEvent::EndpointReady {
            address: endpoint.address().to_string(),
            mode: endpoint.mode(),
        });
    }

    fn endpoint_failed(&self, port: &PortConfig, _error: &EndpointSetupError) {
        self.record(HealthEvent::EndpointFailed {
            address: port.address().to_string(),
        });
    }

    fn server_started(&self, endpoints: usize) {
        self.record(HealthEvent::ServerStarted(endpoints));
    }

    fn server_stopped(&self, cancelled_triggers: usize) {
        self.record(HealthEvent::ServerStopped(cancelled_triggers));
    }

    fn transport_error(&self, error: &TransportError) {
        self.record(HealthEvent::TransportError(error.to_string()));
    }
}

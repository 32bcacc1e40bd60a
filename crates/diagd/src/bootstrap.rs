//! Server bootstrap orchestration.

use std::fmt;
use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;

use diag_config::{Config, PortConfig, PortParseError, PortPreparationError};

use crate::context::ServerContext;
use crate::health::HealthReporter;
use crate::runtime::{RuntimeIdentity, RuntimeServices};
use crate::server::{DiagnosticServer, ServerError};
use crate::telemetry::{self, TelemetryError, TelemetryHandle};
use crate::transport::{Endpoint, TransportError, UnixDialer};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the server configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that hands out a fixed configuration, for hosts that resolve
/// settings themselves.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps an already resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// The diagnostic port list could not be parsed.
    #[error("invalid diagnostic port configuration: {source}")]
    Ports {
        /// Parser error naming the offending entry.
        #[source]
        source: PortParseError,
    },
}

/// Why a single configured port could not be opened.
#[derive(Debug, Error)]
pub enum EndpointSetupError {
    /// The socket directory could not be created.
    #[error(transparent)]
    Prepare(#[from] PortPreparationError),
    /// The socket could not be bound.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of a successful bootstrap: endpoints are open but not yet served.
pub struct Daemon {
    config: Config,
    identity: RuntimeIdentity,
    endpoints: Vec<Endpoint>,
    pause_startup: bool,
    telemetry: TelemetryHandle,
    reporter: Arc<dyn HealthReporter>,
}

impl fmt::Debug for Daemon {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Daemon")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("endpoints", &self.endpoints)
            .field("pause_startup", &self.pause_startup)
            .finish_non_exhaustive()
    }
}

impl Daemon {
    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Identity advertised on reverse connections.
    #[must_use]
    pub fn identity(&self) -> &RuntimeIdentity {
        &self.identity
    }

    /// Endpoints that opened successfully, in configuration order.
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Whether an open port asked runtime start-up to wait for a monitor.
    #[must_use]
    pub fn pause_startup(&self) -> bool {
        self.pause_startup
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }

    /// Starts serving the open endpoints against `services`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the server thread cannot be started.
    pub fn start(self, services: RuntimeServices) -> Result<DiagnosticServer, ServerError> {
        let context = Arc::new(ServerContext::new(
            self.identity,
            services,
            self.pause_startup,
        ));
        DiagnosticServer::start(
            context,
            self.endpoints,
            self.config.poll_timeouts(),
            self.config.request_timeout(),
            self.reporter,
        )
    }
}

/// Bootstraps the server using the supplied collaborators.
///
/// Configuration, telemetry and the port list are fatal when they fail. A
/// port that cannot be opened is reported and skipped; the remaining ports
/// still serve.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let ports = match config.ports() {
        Ok(ports) => ports,
        Err(source) => {
            let error = BootstrapError::Ports { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let identity = RuntimeIdentity::current();
    let mut endpoints = Vec::with_capacity(ports.len());
    let mut pause_startup = false;
    for port in &ports {
        match open_endpoint(port, &identity) {
            Ok(endpoint) => {
                reporter.endpoint_ready(&endpoint);
                pause_startup |= port.suspend();
                endpoints.push(endpoint);
            }
            Err(error) => reporter.endpoint_failed(port, &error),
        }
    }

    reporter.bootstrap_succeeded(&config);
    Ok(Daemon {
        config,
        identity,
        endpoints,
        pause_startup,
        telemetry,
        reporter,
    })
}

fn open_endpoint(
    port: &PortConfig,
    identity: &RuntimeIdentity,
) -> Result<Endpoint, EndpointSetupError> {
    port.prepare_filesystem()?;
    Ok(Endpoint::from_port(
        port,
        identity.handshake(),
        Box::new(UnixDialer),
    )?)
}

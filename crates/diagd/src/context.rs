//! State shared by the dispatcher thread and the embedding runtime.

use std::sync::Arc;

use crate::runtime::{RuntimeIdentity, RuntimeServices};
use crate::startup::StartupGate;
use crate::triggers::TriggerRegistry;

/// Built once per server and shared through an `Arc`.
#[derive(Debug)]
pub struct ServerContext {
    identity: RuntimeIdentity,
    services: RuntimeServices,
    triggers: Arc<TriggerRegistry>,
    startup: StartupGate,
}

impl ServerContext {
    /// Creates a context. The start-up gate is closed when `pause_startup`
    /// is `true`.
    #[must_use]
    pub fn new(identity: RuntimeIdentity, services: RuntimeServices, pause_startup: bool) -> Self {
        Self {
            identity,
            services,
            triggers: Arc::new(TriggerRegistry::new()),
            startup: StartupGate::new(pause_startup),
        }
    }

    /// Identity advertised to monitors and reported by `ProcessInfo`.
    #[must_use]
    pub fn identity(&self) -> &RuntimeIdentity {
        &self.identity
    }

    /// Runtime collaborators.
    #[must_use]
    pub fn services(&self) -> &RuntimeServices {
        &self.services
    }

    /// Pending trigger registry, shared with the runtime's event hooks.
    #[must_use]
    pub fn triggers(&self) -> &Arc<TriggerRegistry> {
        &self.triggers
    }

    /// Start-up pause gate.
    #[must_use]
    pub fn startup(&self) -> &StartupGate {
        &self.startup
    }
}

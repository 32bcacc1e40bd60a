//! Deferred work attached to a trigger.

use super::registry::{TriggerId, TriggerRegistry};

/// Work run when a trigger's condition is met.
///
/// Actions own whatever they need to reply to their requester. `run` is
/// called with the registry unlocked, so it may register or unregister
/// triggers, including itself.
pub trait TriggerAction: Send + Sync {
    /// Performs the deferred work.
    fn run(&self, scope: TriggerScope<'_>);

    /// Abandons the work because the trigger was unregistered or the server
    /// is shutting down. Must tolerate being called after `run`.
    fn cancel(&self);
}

/// Context handed to [`TriggerAction::run`].
#[derive(Debug, Clone, Copy)]
pub struct TriggerScope<'a> {
    registry: &'a TriggerRegistry,
    id: TriggerId,
    identity: &'a str,
}

impl<'a> TriggerScope<'a> {
    pub(super) fn new(registry: &'a TriggerRegistry, id: TriggerId, identity: &'a str) -> Self {
        Self {
            registry,
            id,
            identity,
        }
    }

    /// Id of the trigger being run.
    #[must_use]
    pub fn id(&self) -> TriggerId {
        self.id
    }

    /// Identity the trigger was registered under.
    #[must_use]
    pub fn identity(&self) -> &'a str {
        self.identity
    }

    /// Registry that owns the trigger.
    #[must_use]
    pub fn registry(&self) -> &'a TriggerRegistry {
        self.registry
    }

    /// Removes the trigger without cancelling it, for one-shot actions that
    /// have finished. Returns `false` if it was already gone.
    pub fn retire(&self) -> bool {
        self.registry.remove(self.id).is_some()
    }
}

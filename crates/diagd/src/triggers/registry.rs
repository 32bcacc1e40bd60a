//! Pending triggers and their dispatch.

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info};

use super::action::{TriggerAction, TriggerScope};
use super::condition::{GcMarkEvent, TriggerCondition};
use super::errors::TriggerError;
use super::TRIGGERS_TARGET;

/// Registry-assigned trigger id, unique for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(u64);

impl fmt::Display for TriggerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

struct PendingTrigger {
    id: TriggerId,
    identity: Arc<str>,
    condition: TriggerCondition,
    action: Arc<dyn TriggerAction>,
}

#[derive(Default)]
struct RegistryState {
    entries: VecDeque<PendingTrigger>,
    next_id: u64,
}

/// Condition-triggered actions awaiting runtime events.
///
/// Newest registrations come first. A single mutex guards the entries and is
/// never held while an action runs or is cancelled.
#[derive(Default)]
pub struct TriggerRegistry {
    state: Mutex<RegistryState>,
}

impl TriggerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Parses `condition` and registers `action` under `identity`.
    /// Identities need not be unique.
    ///
    /// # Errors
    ///
    /// Returns the parse error and leaves the registry unchanged when the
    /// condition is invalid.
    pub fn register(
        &self,
        condition: &str,
        identity: &str,
        action: Arc<dyn TriggerAction>,
    ) -> Result<TriggerId, TriggerError> {
        let condition = TriggerCondition::parse(condition)?;
        let mut state = self.lock();
        state.next_id += 1;
        let id = TriggerId(state.next_id);
        state.entries.push_front(PendingTrigger {
            id,
            identity: Arc::from(identity),
            condition,
            action,
        });
        drop(state);
        info!(
            target: TRIGGERS_TARGET,
            trigger = %id,
            identity,
            ?condition,
            "trigger registered"
        );
        Ok(id)
    }

    /// Removes the most recent trigger registered under `identity` and
    /// cancels its action. Returns whether one was found.
    pub fn unregister(&self, identity: &str) -> bool {
        let removed = {
            let mut state = self.lock();
            state
                .entries
                .iter()
                .position(|entry| &*entry.identity == identity)
                .and_then(|index| state.entries.remove(index))
        };
        let Some(entry) = removed else {
            debug!(target: TRIGGERS_TARGET, identity, "no trigger to unregister");
            return false;
        };
        info!(
            target: TRIGGERS_TARGET,
            trigger = %entry.id,
            identity,
            "trigger unregistered"
        );
        entry.action.cancel();
        true
    }

    /// Removes the trigger `id` without cancelling it, returning its action.
    pub fn remove(&self, id: TriggerId) -> Option<Arc<dyn TriggerAction>> {
        let mut state = self.lock();
        let index = state.entries.iter().position(|entry| entry.id == id)?;
        state.entries.remove(index).map(|entry| entry.action)
    }

    /// Returns `true` while `id` is registered.
    #[must_use]
    pub fn contains(&self, id: TriggerId) -> bool {
        self.lock().entries.iter().any(|entry| entry.id == id)
    }

    /// Number of pending triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` when nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Runs every trigger whose condition `event` satisfies, newest first,
    /// returning how many ran.
    ///
    /// Matches are snapshotted up front; a trigger removed by an earlier
    /// action in the same sweep is skipped.
    pub fn on_gc_mark_complete(&self, event: &GcMarkEvent) -> usize {
        let matching: Vec<TriggerId> = self
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.condition.matches(event))
            .map(|entry| entry.id)
            .collect();

        let mut ran = 0;
        for id in matching {
            let Some((identity, action)) = self.lookup(id) else {
                continue;
            };
            debug!(target: TRIGGERS_TARGET, trigger = %id, ?event, "running trigger");
            let scope = TriggerScope::new(self, id, &identity);
            if panic::catch_unwind(AssertUnwindSafe(|| action.run(scope))).is_err() {
                error!(
                    target: TRIGGERS_TARGET,
                    trigger = %id,
                    identity = &*identity,
                    "trigger action panicked"
                );
            }
            ran += 1;
        }
        ran
    }

    /// Removes every trigger and cancels its action, returning how many were
    /// pending.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<PendingTrigger> = self.lock().entries.drain(..).collect();
        let count = drained.len();
        for entry in drained {
            entry.action.cancel();
        }
        if count > 0 {
            info!(target: TRIGGERS_TARGET, count, "cancelled pending triggers");
        }
        count
    }

    fn lookup(&self, id: TriggerId) -> Option<(Arc<str>, Arc<dyn TriggerAction>)> {
        self.lock()
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| (Arc::clone(&entry.identity), Arc::clone(&entry.action)))
    }
}

impl fmt::Debug for TriggerRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TriggerRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

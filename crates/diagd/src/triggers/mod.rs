//! Condition-triggered deferred actions.
//!
//! A client can ask for work (today, a core dump) to happen later, when the
//! runtime reports an event matching a small `key=value` condition. The
//! [`TriggerRegistry`] holds those requests until the runtime's hook calls
//! [`TriggerRegistry::on_gc_mark_complete`], or until they are cancelled.

mod action;
mod condition;
mod errors;
mod properties;
mod registry;

pub use self::action::{TriggerAction, TriggerScope};
pub use self::condition::{GcMarkEvent, TriggerCondition};
pub use self::errors::TriggerError;
pub use self::properties::{Property, PropertyList, parse_properties};
pub use self::registry::{TriggerId, TriggerRegistry};

const TRIGGERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::triggers");

//! Conditions a deferred action waits for.

use std::str::FromStr;

use super::errors::TriggerError;
use super::properties::{PropertyList, parse_properties};

const WHEN: &str = "when";
const ON_GC_MARK_COMPLETE: &str = "ongcmarkcomplete";
const GENERATION: &str = "gen";
const PROMOTED_BYTES_THRESHOLD: &str = "promoted_bytes_threshold";

/// Notification raised when the garbage collector finishes marking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GcMarkEvent {
    /// Generation that was collected.
    pub generation: u32,
    /// Bytes promoted out of that generation.
    pub promoted_bytes: u64,
}

/// Parsed trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCondition {
    /// Fires after a mark phase of `generation` that promoted at least
    /// `promoted_bytes_threshold` bytes.
    GcMarkComplete {
        generation: u32,
        promoted_bytes_threshold: u64,
    },
}

impl TriggerCondition {
    /// Parses condition DSL text. Unrecognised keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`TriggerError`] describing the first problem found.
    pub fn parse(text: &str) -> Result<Self, TriggerError> {
        let properties = parse_properties(text).ok_or_else(|| TriggerError::Malformed {
            text: text.to_owned(),
        })?;
        match properties.get(WHEN) {
            Some(ON_GC_MARK_COMPLETE) => Ok(Self::GcMarkComplete {
                generation: integer(&properties, GENERATION)?,
                promoted_bytes_threshold: integer(&properties, PROMOTED_BYTES_THRESHOLD)?,
            }),
            Some(other) => Err(TriggerError::UnsupportedEvent {
                event: other.to_owned(),
            }),
            None => Err(TriggerError::MissingProperty { name: WHEN }),
        }
    }

    /// Returns `true` when `event` satisfies the condition.
    #[must_use]
    pub fn matches(&self, event: &GcMarkEvent) -> bool {
        match *self {
            Self::GcMarkComplete {
                generation,
                promoted_bytes_threshold,
            } => event.generation == generation && event.promoted_bytes >= promoted_bytes_threshold,
        }
    }
}

impl FromStr for TriggerCondition {
    type Err = TriggerError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

fn integer<T: FromStr>(properties: &PropertyList, name: &'static str) -> Result<T, TriggerError> {
    let value = properties
        .get(name)
        .ok_or(TriggerError::MissingProperty { name })?;
    value.parse().map_err(|_| TriggerError::InvalidInteger {
        name,
        value: value.to_owned(),
    })
}

//! Error types for trigger registration.

use thiserror::Error;

/// Reasons a trigger condition is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("malformed trigger condition: {text:?}")]
    Malformed { text: String },
    #[error("trigger condition is missing `{name}`")]
    MissingProperty { name: &'static str },
    #[error("trigger property `{name}` is not a valid integer: {value:?}")]
    InvalidInteger { name: &'static str, value: String },
    #[error("unsupported trigger event `{event}`")]
    UnsupportedEvent { event: String },
}

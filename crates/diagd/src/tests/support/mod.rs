//! Shared harness for the behaviour suites.

mod client;
mod config_loader;
mod reporter;

pub use self::client::{
    connect, read_advertise, read_reply, read_status, send, send_empty, wait_until, with_timeouts,
};
pub use self::config_loader::{FailingConfigLoader, SocketDir, test_config};
pub use self::reporter::{HealthEvent, RecordingHealthReporter};

//! Shared configuration for the diagnostics server.
//!
//! Settings are layered by `ortho_config`: built-in defaults, then an
//! optional configuration file, then `DIAGD_*` environment variables, then
//! command-line flags. The resolved [`Config`] describes which diagnostic
//! ports the runtime opens, how aggressively reverse connections are retried,
//! and how log events are rendered.

mod defaults;
mod logging;
mod ports;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_POLL_TIMEOUT_FALLOFF, DEFAULT_POLL_TIMEOUT_MAX_MS,
    DEFAULT_POLL_TIMEOUT_MIN_MS, DEFAULT_REQUEST_TIMEOUT_MS, default_listen_address,
    default_log_filter, default_log_filter_string, default_log_format, disambiguation_key,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use ports::{PortConfig, PortMode, PortParseError, PortPreparationError, parse_port_list};

/// Resolved diagnostics server configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "DIAGD")]
pub struct Config {
    /// `;`-separated diagnostic ports, each
    /// `address[,listen|connect][,suspend|nosuspend]`.
    #[serde(default)]
    pub diagnostic_ports: String,
    /// Suspend flag applied to ports that do not specify one.
    #[serde(default)]
    pub default_port_suspend: bool,
    /// Skips the per-process default listen port.
    #[serde(default)]
    pub disable_default_port: bool,
    /// Shortest reverse-connect retry wait in milliseconds.
    #[serde(default = "defaults::default_poll_timeout_min_ms")]
    pub poll_timeout_min_ms: u64,
    /// Longest reverse-connect retry wait in milliseconds.
    #[serde(default = "defaults::default_poll_timeout_max_ms")]
    pub poll_timeout_max_ms: u64,
    /// Multiplier applied to the retry wait after each failed dial.
    #[serde(default = "defaults::default_poll_timeout_falloff")]
    pub poll_timeout_falloff: f64,
    /// Longest a connection may stall while a request is read or its reply
    /// written, in milliseconds. Zero disables the limit.
    #[serde(default = "defaults::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// `tracing` filter expression.
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Log rendering format.
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            diagnostic_ports: String::new(),
            default_port_suspend: false,
            disable_default_port: false,
            poll_timeout_min_ms: DEFAULT_POLL_TIMEOUT_MIN_MS,
            poll_timeout_max_ms: DEFAULT_POLL_TIMEOUT_MAX_MS,
            poll_timeout_falloff: DEFAULT_POLL_TIMEOUT_FALLOFF,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

/// Reverse-connect retry tuning derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollTimeouts {
    /// Wait after the first failed dial.
    pub min: Duration,
    /// Upper bound, and the rest interval once connected.
    pub max: Duration,
    /// Growth factor per consecutive failure, at least 1.0.
    pub falloff: f64,
}

impl Default for PollTimeouts {
    fn default() -> Self {
        Config::default().poll_timeouts()
    }
}

impl Config {
    /// Returns the configured log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Returns the configured log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the per-connection I/O limit for dispatched requests.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolves every port the server should open: the explicit port list
    /// followed by the default listen port unless it is disabled.
    pub fn ports(&self) -> Result<Vec<PortConfig>, PortParseError> {
        let mut ports = parse_port_list(&self.diagnostic_ports, self.default_port_suspend)?;
        if !self.disable_default_port {
            ports.push(
                PortConfig::listen(default_listen_address())
                    .with_suspend(self.default_port_suspend),
            );
        }
        Ok(ports)
    }

    /// Returns the retry tuning. A maximum below the minimum is raised to
    /// the minimum and a falloff below 1.0 (or NaN) becomes 1.0.
    #[must_use]
    pub fn poll_timeouts(&self) -> PollTimeouts {
        let min = Duration::from_millis(self.poll_timeout_min_ms);
        let max = Duration::from_millis(self.poll_timeout_max_ms).max(min);
        let falloff = if self.poll_timeout_falloff >= 1.0 {
            self.poll_timeout_falloff
        } else {
            1.0
        };
        PollTimeouts { min, max, falloff }
    }
}

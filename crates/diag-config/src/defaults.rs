use std::env;
use std::fs;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Shortest wait between reverse-connect attempts, in milliseconds.
pub const DEFAULT_POLL_TIMEOUT_MIN_MS: u64 = 10;

/// Longest wait between reverse-connect attempts, in milliseconds. Also the
/// "rest" interval used once every reverse connection is established.
pub const DEFAULT_POLL_TIMEOUT_MAX_MS: u64 = 500;

/// Growth factor applied to the wait after each consecutive failed dial.
pub const DEFAULT_POLL_TIMEOUT_FALLOFF: f64 = 1.25;

/// Longest a dispatched connection may stall a read or write, in
/// milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Default log filter expression used by the server.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Serde default for [`crate::Config::poll_timeout_min_ms`].
pub fn default_poll_timeout_min_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MIN_MS
}

/// Serde default for [`crate::Config::poll_timeout_max_ms`].
pub fn default_poll_timeout_max_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MAX_MS
}

/// Serde default for [`crate::Config::poll_timeout_falloff`].
pub fn default_poll_timeout_falloff() -> f64 {
    DEFAULT_POLL_TIMEOUT_FALLOFF
}

/// Serde default for [`crate::Config::request_timeout_ms`].
pub fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Computes the address of the default listen port for this process.
///
/// Tools discover running processes by scanning the temporary directory for
/// `dotnet-diagnostic-{pid}-{key}-socket`, where `key` disambiguates a
/// recycled pid by the process start time.
pub fn default_listen_address() -> Utf8PathBuf {
    let base = Utf8PathBuf::from_path_buf(env::temp_dir())
        .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"));
    base.join(format!(
        "dotnet-diagnostic-{}-{}-socket",
        std::process::id(),
        disambiguation_key()
    ))
}

/// Returns the process start time in clock ticks, or zero when unavailable.
pub fn disambiguation_key() -> u64 {
    fs::read_to_string("/proc/self/stat")
        .ok()
        .and_then(|stat| parse_start_time(&stat))
        .unwrap_or(0)
}

// Field 22 of proc(5); the command name in field 2 may contain spaces, so
// count from the closing parenthesis.
fn parse_start_time(stat: &str) -> Option<u64> {
    let (_, tail) = stat.rsplit_once(')')?;
    tail.split_whitespace().nth(19)?.parse().ok()
}

//! Configuration fixtures backed by a temporary socket directory.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use diag_config::{Config, LogFormat};

use crate::bootstrap::{ConfigLoader, StaticConfigLoader};

/// Temporary directory holding the sockets of one scenario.
pub struct SocketDir {
    dir: TempDir,
}

impl SocketDir {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temporary socket directory"),
        }
    }

    /// Path of `name` inside the directory.
    #[must_use]
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().join(name))
            .expect("temporary socket path was not valid UTF-8")
    }

    /// Loader for a configuration serving `ports`, a port list whose
    /// entries may name sockets in this directory as `{dir}/name`.
    #[must_use]
    pub fn loader(&self, ports: &str) -> StaticConfigLoader {
        let ports = ports.replace("{dir}", self.dir.path().to_str().expect("utf8 dir"));
        StaticConfigLoader::new(test_config(ports))
    }
}

/// Configuration with the default port disabled, fast retry tuning and a
/// short request timeout.
#[must_use]
pub fn test_config(diagnostic_ports: String) -> Config {
    Config {
        diagnostic_ports,
        disable_default_port: true,
        poll_timeout_min_ms: 1,
        poll_timeout_max_ms: 20,
        poll_timeout_falloff: 2.0,
        request_timeout_ms: 200,
        log_filter: "warn".to_owned(),
        log_format: LogFormat::Compact,
        ..Config::default()
    }
}

/// Loader that fails by passing an unparsable CLI argument.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("diagd"),
            OsString::from("--poll-timeout-min-ms"),
            OsString::from("soon"),
        ];
        Config::load_from_iter(args)
    }
}

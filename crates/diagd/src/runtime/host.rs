//! Collaborators for the standalone host process.

use std::env;
use std::fs;

use crate::protocol::{AttachProfilerRequest, CollectTracing2Request, DumpRequest};

use super::{
    DumpGenerator, ProcessDetails, ProcessIntrospector, ProfilerAttacher, RuntimeError,
    TraceSessions,
};

/// Runtime backing the `diagd` binary. It can describe its own process but
/// has no managed heap, trace engine or profiler loader, so those requests
/// fail with `NOT_IMPLEMENTED`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostRuntime;

impl DumpGenerator for HostRuntime {
    fn generate(&self, _request: &DumpRequest) -> Result<(), RuntimeError> {
        Err(RuntimeError::not_implemented("core dump generation"))
    }
}

impl TraceSessions for HostRuntime {
    fn start(&self, _request: &CollectTracing2Request) -> Result<u64, RuntimeError> {
        Err(RuntimeError::not_implemented("trace collection"))
    }

    fn stop(&self, _session_id: u64) -> Result<u64, RuntimeError> {
        Err(RuntimeError::not_implemented("trace collection"))
    }
}

impl ProfilerAttacher for HostRuntime {
    fn attach(&self, _request: &AttachProfilerRequest) -> Result<(), RuntimeError> {
        Err(RuntimeError::not_implemented("profiler attach"))
    }
}

impl ProcessIntrospector for HostRuntime {
    fn describe(&self) -> ProcessDetails {
        ProcessDetails {
            command_line: command_line(),
            os: os_name(env::consts::OS).to_owned(),
            arch: arch_name(env::consts::ARCH).to_owned(),
        }
    }
}

fn command_line() -> String {
    match fs::read("/proc/self/cmdline") {
        Ok(raw) => raw
            .split(|byte| *byte == 0)
            .filter(|arg| !arg.is_empty())
            .map(String::from_utf8_lossy)
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn os_name(os: &str) -> &str {
    match os {
        "linux" => "Linux",
        "macos" => "macOS",
        "freebsd" => "FreeBSD",
        other => other,
    }
}

fn arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        "x86" => "x86",
        "arm" => "arm",
        other => other,
    }
}

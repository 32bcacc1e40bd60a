//! `mockall` doubles for the runtime collaborators.

use std::sync::Arc;

use mockall::mock;

use crate::protocol::{AttachProfilerRequest, CollectTracing2Request, DumpRequest};

use super::{
    DumpGenerator, ProcessDetails, ProcessIntrospector, ProfilerAttacher, RuntimeError,
    RuntimeServices, TraceSessions,
};

mock! {
    pub Dumps {}

    impl DumpGenerator for Dumps {
        fn generate(&self, request: &DumpRequest) -> Result<(), RuntimeError>;
    }
}

mock! {
    pub Tracing {}

    impl TraceSessions for Tracing {
        fn start(&self, request: &CollectTracing2Request) -> Result<u64, RuntimeError>;
        fn stop(&self, session_id: u64) -> Result<u64, RuntimeError>;
    }
}

mock! {
    pub Profiler {}

    impl ProfilerAttacher for Profiler {
        fn attach(&self, request: &AttachProfilerRequest) -> Result<(), RuntimeError>;
    }
}

mock! {
    pub Process {}

    impl ProcessIntrospector for Process {
        fn describe(&self) -> ProcessDetails;
    }
}

/// Collects mock expectations before freezing them into [`RuntimeServices`].
/// Collaborators left untouched reject every call.
#[derive(Default)]
pub(crate) struct MockRuntime {
    pub dumps: MockDumps,
    pub tracing: MockTracing,
    pub profiler: MockProfiler,
    pub process: MockProcess,
}

impl MockRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn into_services(self) -> RuntimeServices {
        RuntimeServices {
            dumps: Arc::new(self.dumps),
            tracing: Arc::new(self.tracing),
            profiler: Arc::new(self.profiler),
            process: Arc::new(self.process),
        }
    }
}

//! Typed request and reply payloads.
//!
//! Each payload is a flat concatenation of fields decoded in a fixed order.
//! Decoding is all-or-nothing: truncation, malformed strings and
//! out-of-range values all yield `None`, which the dispatcher reports as a
//! bad encoding.

use std::time::Duration;

use uuid::Uuid;

use super::cursor::PayloadCursor;
use super::status::DiagnosticStatus;
use super::writer::PayloadWriter;

/// Highest event verbosity level a provider may request.
pub const MAX_EVENT_LEVEL: u32 = 5;

// keywords + level + two empty string prefixes
const MIN_PROVIDER_BYTES: usize = 8 + 4 + 4 + 4;

/// A payload with a fixed wire layout.
pub trait WirePayload: Sized {
    /// Decodes the payload from the cursor's position.
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self>;

    /// Appends the encoded payload.
    fn encode(&self, writer: &mut PayloadWriter);
}

fn decode_string(cursor: &mut PayloadCursor<'_>) -> Option<String> {
    cursor.try_parse_string()?.to_string_strict()
}

/// Reply payload holding a single status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReply(pub DiagnosticStatus);

impl WirePayload for StatusReply {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        cursor
            .try_parse::<u32>()
            .map(|code| Self(DiagnosticStatus::from_code(code)))
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer.write(self.0.code());
    }
}

/// Reply payload holding a trace session id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReply(pub u64);

impl WirePayload for SessionReply {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        cursor.try_parse().map(Self)
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer.write(self.0);
    }
}

/// Amount of memory captured in a core dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum DumpType {
    /// Stacks and module lists.
    Normal = 1,
    /// Normal plus the managed heap.
    WithHeap = 2,
    /// Minimal dump with personal data stripped.
    Triage = 3,
    /// All process memory.
    Full = 4,
}

impl DumpType {
    /// Maps a raw dump type, rejecting unknown values.
    #[must_use]
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::WithHeap),
            3 => Some(Self::Triage),
            4 => Some(Self::Full),
            _ => None,
        }
    }
}

/// `GenerateCoreDump` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRequest {
    /// Output path; empty lets the runtime choose.
    pub dump_name: String,
    /// Requested dump contents.
    pub dump_type: DumpType,
    /// Generator flags, passed through untouched.
    pub flags: u32,
}

impl WirePayload for DumpRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let dump_name = decode_string(cursor)?;
        let dump_type = DumpType::from_u32(cursor.try_parse()?)?;
        let flags = cursor.try_parse()?;
        Some(Self {
            dump_name,
            dump_type,
            flags,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write_string(&self.dump_name)
            .write(self.dump_type as u32)
            .write(self.flags);
    }
}

/// `GenerateCoreDump2` payload: a dump request that may wait for a trigger
/// condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredDumpRequest {
    /// Dump to write.
    pub dump: DumpRequest,
    /// Condition DSL text; empty means dump immediately.
    pub condition: String,
    /// Caller-chosen name used to cancel the trigger later.
    pub identity: String,
}

impl TriggeredDumpRequest {
    /// Returns `true` when the dump waits for a condition.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        !self.condition.is_empty()
    }
}

impl WirePayload for TriggeredDumpRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let dump = DumpRequest::decode(cursor)?;
        let condition = decode_string(cursor)?;
        let identity = decode_string(cursor)?;
        if !condition.is_empty() && identity.is_empty() {
            return None;
        }
        Some(Self {
            dump,
            condition,
            identity,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        self.dump.encode(writer);
        writer
            .write_string(&self.condition)
            .write_string(&self.identity);
    }
}

/// `CancelDumpTrigger` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelTriggerRequest {
    /// Identity the trigger was registered under.
    pub identity: String,
}

impl WirePayload for CancelTriggerRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let identity = decode_string(cursor)?;
        (!identity.is_empty()).then_some(Self { identity })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer.write_string(&self.identity);
    }
}

/// One event provider enabled by a trace session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Keyword mask.
    pub keywords: u64,
    /// Verbosity, at most [`MAX_EVENT_LEVEL`].
    pub level: u32,
    /// Provider name, never empty.
    pub name: String,
    /// Provider-specific filter arguments.
    pub filter_data: String,
}

impl WirePayload for ProviderConfig {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let keywords = cursor.try_parse()?;
        let level = cursor.try_parse()?;
        if level > MAX_EVENT_LEVEL {
            return None;
        }
        let name = decode_string(cursor)?;
        if name.is_empty() {
            return None;
        }
        let filter_data = decode_string(cursor)?;
        Some(Self {
            keywords,
            level,
            name,
            filter_data,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write(self.keywords)
            .write(self.level)
            .write_string(&self.name)
            .write_string(&self.filter_data);
    }
}

fn decode_providers(cursor: &mut PayloadCursor<'_>) -> Option<Vec<ProviderConfig>> {
    let count = usize::try_from(cursor.try_parse::<u32>()?).ok()?;
    if count == 0 || count.checked_mul(MIN_PROVIDER_BYTES)? > cursor.remaining() {
        return None;
    }
    let mut providers = Vec::with_capacity(count);
    for _ in 0..count {
        providers.push(ProviderConfig::decode(cursor)?);
    }
    Some(providers)
}

fn encode_providers(providers: &[ProviderConfig], writer: &mut PayloadWriter) {
    writer.write(u32::try_from(providers.len()).unwrap_or(u32::MAX));
    for provider in providers {
        provider.encode(writer);
    }
}

/// `CollectTracing` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectTracingRequest {
    /// Session buffer size in megabytes, non-zero.
    pub circular_buffer_mb: u32,
    /// Trace file path.
    pub output_path: String,
    /// Providers to enable, at least one.
    pub providers: Vec<ProviderConfig>,
}

impl WirePayload for CollectTracingRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let circular_buffer_mb = cursor.try_parse::<u32>().filter(|size| *size > 0)?;
        let output_path = decode_string(cursor)?;
        let providers = decode_providers(cursor)?;
        Some(Self {
            circular_buffer_mb,
            output_path,
            providers,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write(self.circular_buffer_mb)
            .write_string(&self.output_path);
        encode_providers(&self.providers, writer);
    }
}

/// `CollectTracing2` payload; adds control over the rundown events emitted
/// when the session stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectTracing2Request {
    /// Session buffer size in megabytes, non-zero.
    pub circular_buffer_mb: u32,
    /// Trace file path.
    pub output_path: String,
    /// Emit rundown events at session end.
    pub request_rundown: bool,
    /// Providers to enable, at least one.
    pub providers: Vec<ProviderConfig>,
}

impl From<CollectTracingRequest> for CollectTracing2Request {
    fn from(request: CollectTracingRequest) -> Self {
        Self {
            circular_buffer_mb: request.circular_buffer_mb,
            output_path: request.output_path,
            request_rundown: true,
            providers: request.providers,
        }
    }
}

impl WirePayload for CollectTracing2Request {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let circular_buffer_mb = cursor.try_parse::<u32>().filter(|size| *size > 0)?;
        let output_path = decode_string(cursor)?;
        let request_rundown = cursor.try_parse_bool()?;
        let providers = decode_providers(cursor)?;
        Some(Self {
            circular_buffer_mb,
            output_path,
            request_rundown,
            providers,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write(self.circular_buffer_mb)
            .write_string(&self.output_path)
            .write_bool(self.request_rundown);
        encode_providers(&self.providers, writer);
    }
}

/// `StopTracing` payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTracingRequest {
    /// Session to stop.
    pub session_id: u64,
}

impl WirePayload for StopTracingRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        cursor.try_parse().map(|session_id| Self { session_id })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer.write(self.session_id);
    }
}

/// `AttachProfiler` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachProfilerRequest {
    /// How long the profiler may take to initialise, in milliseconds.
    pub attach_timeout_ms: u32,
    /// Profiler class id, never nil.
    pub profiler_guid: Uuid,
    /// Path to the profiler library, never empty.
    pub profiler_path: String,
    /// Opaque bytes handed to the profiler.
    pub client_data: Vec<u8>,
}

impl AttachProfilerRequest {
    /// Attach timeout as a duration.
    #[must_use]
    pub fn attach_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.attach_timeout_ms))
    }
}

impl WirePayload for AttachProfilerRequest {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        let attach_timeout_ms = cursor.try_parse()?;
        let profiler_guid = cursor.try_parse_guid().filter(|guid| !guid.is_nil())?;
        let profiler_path = decode_string(cursor)?;
        if profiler_path.is_empty() {
            return None;
        }
        let client_data_len = usize::try_from(cursor.try_parse::<u32>()?).ok()?;
        let client_data = cursor.try_parse_bytes(client_data_len)?.to_vec();
        Some(Self {
            attach_timeout_ms,
            profiler_guid,
            profiler_path,
            client_data,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write(self.attach_timeout_ms)
            .write_guid(&self.profiler_guid)
            .write_string(&self.profiler_path)
            .write(u32::try_from(self.client_data.len()).unwrap_or(u32::MAX))
            .write_bytes(&self.client_data);
    }
}

/// `ProcessInfo` reply payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Operating system process id.
    pub process_id: u64,
    /// Cookie identifying this runtime instance; matches the advertise
    /// handshake.
    pub runtime_cookie: Uuid,
    /// Full command line.
    pub command_line: String,
    /// Operating system name.
    pub os: String,
    /// Processor architecture name.
    pub arch: String,
}

impl WirePayload for ProcessInfo {
    fn decode(cursor: &mut PayloadCursor<'_>) -> Option<Self> {
        Some(Self {
            process_id: cursor.try_parse()?,
            runtime_cookie: cursor.try_parse_guid()?,
            command_line: decode_string(cursor)?,
            os: decode_string(cursor)?,
            arch: decode_string(cursor)?,
        })
    }

    fn encode(&self, writer: &mut PayloadWriter) {
        writer
            .write(self.process_id)
            .write_guid(&self.runtime_cookie)
            .write_string(&self.command_line)
            .write_string(&self.os)
            .write_string(&self.arch);
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn encode<P: WirePayload>(payload: &P) -> Vec<u8> {
        let mut writer = PayloadWriter::new();
        payload.encode(&mut writer);
        writer.into_bytes()
    }

    fn decode<P: WirePayload>(bytes: &[u8]) -> Option<P> {
        P::decode(&mut PayloadCursor::new(bytes))
    }

    fn provider(name: &str) -> ProviderConfig {
        ProviderConfig {
            keywords: 0x0000_0004_C14F_CCBD,
            level: 4,
            name: name.to_owned(),
            filter_data: String::new(),
        }
    }

    #[test]
    fn dump_v1_has_fixed_layout() {
        let request = DumpRequest {
            dump_name: "core.1234".to_owned(),
            dump_type: DumpType::WithHeap,
            flags: 0,
        };
        let mut expected = vec![10, 0, 0, 0];
        for byte in b"core.1234" {
            expected.extend_from_slice(&[*byte, 0]);
        }
        expected.extend_from_slice(&[0, 0]);
        expected.extend_from_slice(&[2, 0, 0, 0]);
        expected.extend_from_slice(&[0, 0, 0, 0]);

        let bytes = encode(&request);
        assert_eq!(bytes, expected);
        assert_eq!(decode::<DumpRequest>(&bytes), Some(request));
    }

    #[rstest]
    #[case(0)]
    #[case(5)]
    fn dump_rejects_unknown_type(#[case] dump_type: u32) {
        let mut writer = PayloadWriter::new();
        writer.write_string("core").write(dump_type).write(0_u32);
        assert_eq!(decode::<DumpRequest>(&writer.into_bytes()), None);
    }

    #[test]
    fn triggered_dump_round_trips() {
        let request = TriggeredDumpRequest {
            dump: DumpRequest {
                dump_name: "/tmp/gc.dmp".to_owned(),
                dump_type: DumpType::Full,
                flags: 1,
            },
            condition: "when=ongcmarkcomplete,gen=2,promoted_bytes_threshold=1000".to_owned(),
            identity: "leak-hunt".to_owned(),
        };
        assert!(request.is_deferred());
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn conditional_dump_requires_identity() {
        let request = TriggeredDumpRequest {
            dump: DumpRequest {
                dump_name: String::new(),
                dump_type: DumpType::Normal,
                flags: 0,
            },
            condition: "when=ongcmarkcomplete".to_owned(),
            identity: String::new(),
        };
        assert_eq!(decode::<TriggeredDumpRequest>(&encode(&request)), None);
    }

    #[test]
    fn collect_round_trips_with_multiple_providers() {
        let request = CollectTracingRequest {
            circular_buffer_mb: 256,
            output_path: "/tmp/trace.nettrace".to_owned(),
            providers: vec![
                provider("Microsoft-Windows-DotNETRuntime"),
                ProviderConfig {
                    filter_data: "EventCounterIntervalSec=1".to_owned(),
                    ..provider("System.Runtime")
                },
            ],
        };
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn collect2_round_trips_rundown_flag() {
        let request = CollectTracing2Request {
            circular_buffer_mb: 64,
            output_path: String::new(),
            request_rundown: false,
            providers: vec![provider("Microsoft-DotNETCore-SampleProfiler")],
        };
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn collect_v1_upgrades_with_rundown_enabled() {
        let request = CollectTracingRequest {
            circular_buffer_mb: 1,
            output_path: String::new(),
            providers: vec![provider("p")],
        };
        let upgraded = CollectTracing2Request::from(request);
        assert!(upgraded.request_rundown);
    }

    #[test]
    fn collect_rejects_zero_buffer() {
        let request = CollectTracingRequest {
            circular_buffer_mb: 0,
            output_path: String::new(),
            providers: vec![provider("p")],
        };
        assert_eq!(decode::<CollectTracingRequest>(&encode(&request)), None);
    }

    #[test]
    fn collect_rejects_empty_provider_list() {
        let request = CollectTracingRequest {
            circular_buffer_mb: 1,
            output_path: String::new(),
            providers: Vec::new(),
        };
        assert_eq!(decode::<CollectTracingRequest>(&encode(&request)), None);
    }

    #[test]
    fn collect_rejects_provider_count_beyond_payload() {
        let mut writer = PayloadWriter::new();
        writer.write(1_u32).write_string("").write(u32::MAX);
        assert_eq!(decode::<CollectTracingRequest>(&writer.into_bytes()), None);
    }

    #[test]
    fn provider_rejects_excessive_level() {
        let invalid = ProviderConfig {
            level: MAX_EVENT_LEVEL + 1,
            ..provider("p")
        };
        assert_eq!(decode::<ProviderConfig>(&encode(&invalid)), None);
    }

    #[test]
    fn stop_round_trips() {
        let request = StopTracingRequest {
            session_id: 0xDEAD_BEEF_0000_0001,
        };
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn attach_round_trips_client_data() {
        let request = AttachProfilerRequest {
            attach_timeout_ms: 5000,
            profiler_guid: Uuid::parse_str("6652970f-1756-5d8d-0805-e9aad152aa84")
                .expect("guid"),
            profiler_path: "/opt/profiler/libprofiler.so".to_owned(),
            client_data: vec![1, 2, 3, 4, 5],
        };
        assert_eq!(request.attach_timeout(), Duration::from_secs(5));
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn attach_rejects_client_data_past_end() {
        let request = AttachProfilerRequest {
            attach_timeout_ms: 0,
            profiler_guid: Uuid::from_u128(1),
            profiler_path: "/p.so".to_owned(),
            client_data: vec![9; 8],
        };
        let bytes = encode(&request);
        assert_eq!(
            decode::<AttachProfilerRequest>(&bytes[..bytes.len() - 1]),
            None
        );
    }

    #[test]
    fn attach_rejects_nil_guid() {
        let request = AttachProfilerRequest {
            attach_timeout_ms: 0,
            profiler_guid: Uuid::nil(),
            profiler_path: "/p.so".to_owned(),
            client_data: Vec::new(),
        };
        assert_eq!(decode::<AttachProfilerRequest>(&encode(&request)), None);
    }

    #[test]
    fn process_info_round_trips() {
        let info = ProcessInfo {
            process_id: 4242,
            runtime_cookie: Uuid::from_u128(0x0011_2233_4455_6677_8899_AABB_CCDD_EEFF),
            command_line: "/usr/bin/app --serve".to_owned(),
            os: "Linux".to_owned(),
            arch: "x64".to_owned(),
        };
        assert_eq!(decode(&encode(&info)), Some(info));
    }

    #[test]
    fn cancel_round_trips() {
        let request = CancelTriggerRequest {
            identity: "gc-hunt".to_owned(),
        };
        assert_eq!(decode(&encode(&request)), Some(request));
    }

    #[test]
    fn cancel_requires_identity() {
        let mut writer = PayloadWriter::new();
        writer.write(0_u32);
        assert_eq!(decode::<CancelTriggerRequest>(&writer.into_bytes()), None);
    }
}

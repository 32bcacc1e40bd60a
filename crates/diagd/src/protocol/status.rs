use std::fmt;

/// HRESULT-style status code carried in reply payloads.
///
/// Codes with the high bit set are failures. Runtime collaborators may
/// return codes beyond the named constants; they are passed through
/// unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagnosticStatus(u32);

impl DiagnosticStatus {
    /// Success.
    pub const OK: Self = Self(0);
    /// Unspecified failure.
    pub const FAIL: Self = Self(0x8000_4005);
    /// The runtime does not implement the requested operation.
    pub const NOT_IMPLEMENTED: Self = Self(0x8000_4001);
    /// The operation was abandoned before it ran.
    pub const ABORTED: Self = Self(0x8000_4004);
    /// A request field held an unacceptable value.
    pub const INVALID_ARGUMENT: Self = Self(0x8007_0057);
    /// The referenced item does not exist.
    pub const NOT_FOUND: Self = Self(0x8007_0490);
    /// The message or its payload could not be decoded.
    pub const BAD_ENCODING: Self = Self(0x8013_1384);
    /// The command set or command id is not recognised.
    pub const UNKNOWN_COMMAND: Self = Self(0x8013_1385);
    /// The header magic does not match the protocol version.
    pub const UNKNOWN_MAGIC: Self = Self(0x8013_1386);
    /// A profiler is already attached to the process.
    pub const PROFILER_ALREADY_ACTIVE: Self = Self(0x8013_136A);

    /// Wraps a raw status code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        Self(code)
    }

    /// Raw status code.
    #[must_use]
    pub const fn code(self) -> u32 {
        self.0
    }

    /// Returns `true` for success codes.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 & 0x8000_0000 == 0
    }
}

impl fmt::Display for DiagnosticStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{:#010x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_bit_marks_failure() {
        assert!(DiagnosticStatus::OK.is_success());
        assert!(DiagnosticStatus::from_code(1).is_success());
        assert!(!DiagnosticStatus::BAD_ENCODING.is_success());
    }

    #[test]
    fn displays_as_hex() {
        assert_eq!(DiagnosticStatus::UNKNOWN_MAGIC.to_string(), "0x80131386");
    }
}

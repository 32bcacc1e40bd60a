//! Bounds-checked little-endian decoding over a borrowed payload buffer.
//!
//! Every length embedded in a payload is peer controlled. The cursor is the
//! one place those lengths are checked against the bytes actually received;
//! payload decoders never index the buffer themselves.

use std::char::REPLACEMENT_CHARACTER;
use std::fmt;

use uuid::Uuid;

/// Size in bytes of one UTF-16 code unit on the wire.
pub const CODE_UNIT_SIZE: usize = 2;

/// Size in bytes of a GUID on the wire.
pub const GUID_SIZE: usize = 16;

/// Fixed-size integer that can be read from and written to the wire.
pub trait WirePrimitive: Sized + Copy {
    /// Encoded width in bytes.
    const SIZE: usize;

    /// Decodes from exactly [`Self::SIZE`] little-endian bytes.
    fn from_le_slice(bytes: &[u8]) -> Option<Self>;

    /// Appends the little-endian encoding to `out`.
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! wire_primitive {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WirePrimitive for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Option<Self> {
                    <[u8; std::mem::size_of::<$ty>()]>::try_from(bytes)
                        .ok()
                        .map(<$ty>::from_le_bytes)
                }

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

wire_primitive!(u8, u16, u32, u64, i32, i64);

/// Read position over a payload buffer.
///
/// Failed reads leave the position untouched, so a caller can report the
/// failure without worrying about a half-consumed field.
#[derive(Debug, Clone)]
pub struct PayloadCursor<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> PayloadCursor<'a> {
    /// Creates a cursor at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    /// Returns `true` once every byte has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Reads one fixed-size value.
    pub fn try_parse<T: WirePrimitive>(&mut self) -> Option<T> {
        let bytes = self.peek(T::SIZE)?;
        let value = T::from_le_slice(bytes)?;
        self.position += T::SIZE;
        Some(value)
    }

    /// Reads a one-byte boolean; any non-zero value is `true`.
    pub fn try_parse_bool(&mut self) -> Option<bool> {
        self.try_parse::<u8>().map(|byte| byte != 0)
    }

    /// Reads a GUID stored in the Windows mixed-endian layout.
    pub fn try_parse_guid(&mut self) -> Option<Uuid> {
        let bytes = self.try_parse_bytes(GUID_SIZE)?;
        let array = <[u8; GUID_SIZE]>::try_from(bytes).ok()?;
        Some(Uuid::from_bytes_le(array))
    }

    /// Borrows the next `len` raw bytes.
    pub fn try_parse_bytes(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.peek(len)?;
        self.position += len;
        Some(bytes)
    }

    /// Reads a `u32`-prefixed, NUL-terminated UTF-16 string.
    ///
    /// The prefix counts code units including the terminator. A zero prefix
    /// is an absent string and decodes as empty. The returned view borrows
    /// the buffer and excludes the terminator.
    pub fn try_parse_string(&mut self) -> Option<WideStr<'a>> {
        let start = self.position;
        let parsed = self.parse_string_body();
        if parsed.is_none() {
            self.position = start;
        }
        parsed
    }

    fn parse_string_body(&mut self) -> Option<WideStr<'a>> {
        let count = self.try_parse::<u32>()?;
        if count == 0 {
            return Some(WideStr::EMPTY);
        }
        let byte_len = usize::try_from(count).ok()?.checked_mul(CODE_UNIT_SIZE)?;
        let bytes = self.try_parse_bytes(byte_len)?;
        let (text, terminator) = bytes.split_at(byte_len - CODE_UNIT_SIZE);
        if terminator != [0, 0] {
            return None;
        }
        Some(WideStr { bytes: text })
    }

    fn peek(&self, len: usize) -> Option<&'a [u8]> {
        let end = self.position.checked_add(len)?;
        self.buffer.get(self.position..end)
    }
}

/// Borrowed UTF-16LE text inside a payload buffer, terminator excluded.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct WideStr<'a> {
    bytes: &'a [u8],
}

impl<'a> WideStr<'a> {
    /// The empty (or absent) string.
    pub const EMPTY: WideStr<'static> = WideStr { bytes: &[] };

    /// Number of UTF-16 code units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len() / CODE_UNIT_SIZE
    }

    /// Returns `true` for an empty or absent string.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw little-endian bytes of the text.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Iterates the UTF-16 code units.
    pub fn code_units(&self) -> impl Iterator<Item = u16> + 'a {
        self.bytes
            .chunks_exact(CODE_UNIT_SIZE)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Decodes to an owned string, failing on unpaired surrogates.
    #[must_use]
    pub fn to_string_strict(&self) -> Option<String> {
        char::decode_utf16(self.code_units())
            .collect::<Result<String, _>>()
            .ok()
    }

    /// Decodes to an owned string, replacing unpaired surrogates.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        char::decode_utf16(self.code_units())
            .map(|unit| unit.unwrap_or(REPLACEMENT_CHARACTER))
            .collect()
    }
}

impl fmt::Debug for WideStr<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), formatter)
    }
}

impl fmt::Display for WideStr<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.to_string_lossy())
    }
}

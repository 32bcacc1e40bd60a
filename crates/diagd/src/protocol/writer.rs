//! Payload encoding helpers mirroring [`super::cursor::PayloadCursor`].

use uuid::Uuid;

use super::cursor::WirePrimitive;

/// Growable buffer that appends wire-encoded fields.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buffer: Vec<u8>,
}

impl PayloadWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one fixed-size value.
    pub fn write<T: WirePrimitive>(&mut self, value: T) -> &mut Self {
        value.write_le(&mut self.buffer);
        self
    }

    /// Appends a one-byte boolean.
    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.write(u8::from(value))
    }

    /// Appends a GUID in the Windows mixed-endian layout.
    pub fn write_guid(&mut self, value: &Uuid) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_bytes_le());
        self
    }

    /// Appends raw bytes without a length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Appends a counted, NUL-terminated UTF-16 string. The empty string is
    /// written as an absent string (count zero).
    pub fn write_string(&mut self, value: &str) -> &mut Self {
        if value.is_empty() {
            return self.write(0_u32);
        }
        let units: Vec<u16> = value.encode_utf16().chain(std::iter::once(0)).collect();
        let count = u32::try_from(units.len()).unwrap_or(u32::MAX);
        self.write(count);
        for unit in units {
            self.write(unit);
        }
        self
    }

    /// Bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` when nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_includes_count_and_terminator() {
        let mut writer = PayloadWriter::new();
        writer.write_string("ab");
        assert_eq!(
            writer.into_bytes(),
            vec![3, 0, 0, 0, b'a', 0, b'b', 0, 0, 0]
        );
    }

    #[test]
    fn empty_string_is_written_as_absent() {
        let mut writer = PayloadWriter::new();
        writer.write_string("");
        assert_eq!(writer.into_bytes(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn writes_chain() {
        let mut writer = PayloadWriter::new();
        writer.write(1_u8).write(0x0302_u16).write_bool(true);
        assert_eq!(writer.len(), 4);
        assert_eq!(writer.into_bytes(), vec![1, 2, 3, 1]);
    }
}

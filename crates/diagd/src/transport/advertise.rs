//! Handshake written by the server when it dials out to a monitor.

use uuid::Uuid;

use crate::protocol::{PayloadCursor, PayloadWriter};

/// Magic prefix of the advertise handshake.
pub const ADVERTISE_MAGIC: [u8; 8] = *b"ADVR_V1\0";

/// Encoded handshake width in bytes.
pub const ADVERTISE_SIZE: usize = 8 + 16 + 8 + 2;

/// Identifies this runtime to a reverse-connect monitor before any protocol
/// messages flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertiseHandshake {
    /// Random cookie shared with the `ProcessInfo` reply.
    pub cookie: Uuid,
    /// Operating system process id.
    pub process_id: u64,
}

impl AdvertiseHandshake {
    /// Creates a handshake for the given runtime identity.
    #[must_use]
    pub fn new(cookie: Uuid, process_id: u64) -> Self {
        Self { cookie, process_id }
    }

    /// Encodes the handshake.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PayloadWriter::new();
        writer
            .write_bytes(&ADVERTISE_MAGIC)
            .write_guid(&self.cookie)
            .write(self.process_id)
            .write(0_u16);
        writer.into_bytes()
    }

    /// Decodes a handshake, rejecting a wrong magic.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let mut cursor = PayloadCursor::new(bytes);
        if cursor.try_parse_bytes(ADVERTISE_MAGIC.len())? != ADVERTISE_MAGIC {
            return None;
        }
        let cookie = cursor.try_parse_guid()?;
        let process_id = cursor.try_parse()?;
        let _reserved: u16 = cursor.try_parse()?;
        Some(Self { cookie, process_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_has_fixed_layout() {
        let handshake = AdvertiseHandshake::new(Uuid::from_u128(7), 0x0102);
        let bytes = handshake.encode();
        assert_eq!(bytes.len(), ADVERTISE_SIZE);
        assert_eq!(&bytes[..8], b"ADVR_V1\0");
        assert_eq!(&bytes[24..32], &[0x02, 0x01, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[32..], &[0, 0]);
        assert_eq!(AdvertiseHandshake::decode(&bytes), Some(handshake));
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut bytes = AdvertiseHandshake::new(Uuid::from_u128(7), 1).encode();
        bytes[0] = b'X';
        assert_eq!(AdvertiseHandshake::decode(&bytes), None);
    }
}

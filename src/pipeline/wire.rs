//! Raw wire packets.
//!
//! A [`WirePacket`] is a fully pre-serialized (wire id, payload) pair that
//! bypasses typed decoding entirely. Listeners use it to inject synthesized
//! messages into a channel without going through a schema; the transport
//! layer writes the payload verbatim under the given id.

use bytes::Bytes;
use serde::Serialize;

use crate::error::{InterceptError, Result};

/// Pre-serialized packet: wire id plus opaque payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirePacket {
    wire_id: u32,
    payload: Bytes,
}

impl WirePacket {
    pub fn new(wire_id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            wire_id,
            payload: payload.into(),
        }
    }

    /// Serialize a value into the payload with bincode.
    ///
    /// Convenience for hosts whose wire format is bincode-compatible; hosts
    /// with their own framing should serialize first and use [`new`].
    ///
    /// [`new`]: WirePacket::new
    pub fn from_serializable<T: Serialize>(wire_id: u32, value: &T) -> Result<Self> {
        let payload = bincode::serialize(value)
            .map_err(|e| InterceptError::Custom(format!("wire packet serialization: {e}")))?;
        Ok(Self::new(wire_id, payload))
    }

    pub fn wire_id(&self) -> u32 {
        self.wire_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializable_roundtrip() {
        let packet = WirePacket::from_serializable(0x18, &("channel", 42u32)).unwrap();
        assert_eq!(packet.wire_id(), 0x18);

        let decoded: (String, u32) = bincode::deserialize(packet.payload()).unwrap();
        assert_eq!(decoded, ("channel".to_string(), 42));
    }

    #[test]
    fn raw_bytes_pass_through_untouched() {
        let packet = WirePacket::new(0x01, vec![0xDE, 0xAD]);
        assert_eq!(packet.payload().as_ref(), &[0xDE, 0xAD]);
        assert_eq!(packet.len(), 2);
    }
}

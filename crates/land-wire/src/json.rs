// SPDX-License-Identifier: Apache-2.0
//! Conventional JSON-object codec.

use crate::{TransportMessage, WireError};

/// Conventional JSON encoding: named fields, a `kind` tag, JSON-Patch-style
/// operation objects. This is also the handshake lingua franca — the
/// `join`/`joinResponse` frames are always carried in this codec
/// regardless of the session's negotiated encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    /// Serialize a message to a JSON string.
    pub fn encode(&self, msg: &TransportMessage) -> Result<String, WireError> {
        Ok(serde_json::to_string(msg)?)
    }

    /// Serialize a message to JSON bytes.
    pub fn encode_bytes(&self, msg: &TransportMessage) -> Result<Vec<u8>, WireError> {
        Ok(serde_json::to_vec(msg)?)
    }

    /// Deserialize a message from a JSON string.
    pub fn decode(&self, text: &str) -> Result<TransportMessage, WireError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Deserialize a message from JSON bytes.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<TransportMessage, WireError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Encoding, JoinPayload};

    #[test]
    fn round_trips_every_valid_frame() {
        let codec = JsonCodec;
        let msg = TransportMessage::Join(JoinPayload {
            request_id: "r1".into(),
            land_type: "counter".into(),
            land_instance_id: Some("inst-a".into()),
            player_id: None,
            device_id: None,
            metadata: None,
            encoding: Some(Encoding::Json),
        });
        let bytes = codec.encode_bytes(&msg).expect("encode");
        let back = codec.decode_bytes(&bytes).expect("decode");
        assert_eq!(msg, back);
    }
}

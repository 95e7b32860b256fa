// SPDX-License-Identifier: Apache-2.0
//! MessagePack codec over the same opcode-array shape as
//! [`crate::OpcodeJsonCodec`].

use crate::opcode::{from_opcode_value, to_opcode_value};
use crate::{TransportMessage, WireError};

/// MessagePack encoding: identical opcode-array wire shape to
/// [`crate::OpcodeJsonCodec`], serialized as binary instead of text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Serialize a message to MessagePack bytes.
    pub fn encode(&self, msg: &TransportMessage) -> Result<Vec<u8>, WireError> {
        let value = to_opcode_value(msg)?;
        Ok(rmp_serde::to_vec(&value)?)
    }

    /// Deserialize a message from MessagePack bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<TransportMessage, WireError> {
        let value: serde_json::Value = rmp_serde::from_slice(bytes)?;
        from_opcode_value(&value)
    }
}

/// Opcode 107: merge a `stateUpdate` frame with same-tick server events
/// into one transport write, used only in MessagePack mode.
pub const EVENT_MERGE_OPCODE: u8 = 107;

/// `[107, stateUpdateArray, eventsArray]` — the merged frame shape.
pub fn encode_merged(
    update: &TransportMessage,
    events: &[TransportMessage],
) -> Result<Vec<u8>, WireError> {
    let update_value = to_opcode_value(update)?;
    let events_value: Vec<_> = events
        .iter()
        .map(to_opcode_value)
        .collect::<Result<_, _>>()?;
    let merged = serde_json::json!([EVENT_MERGE_OPCODE, update_value, events_value]);
    Ok(rmp_serde::to_vec(&merged)?)
}

/// Decode a merged `[107, stateUpdateArray, eventsArray]` frame.
pub fn decode_merged(bytes: &[u8]) -> Result<(TransportMessage, Vec<TransportMessage>), WireError> {
    let value: serde_json::Value = rmp_serde::from_slice(bytes)?;
    let arr = value
        .as_array()
        .ok_or_else(|| WireError::MalformedFrame("merged frame not an array".into()))?;
    if arr.len() != 3 {
        return Err(WireError::MalformedFrame(
            "merged frame must have 3 elements".into(),
        ));
    }
    let opcode = arr[0]
        .as_u64()
        .ok_or_else(|| WireError::MalformedFrame("merge opcode not a number".into()))?;
    if opcode != u64::from(EVENT_MERGE_OPCODE) {
        return Err(WireError::MalformedFrame(format!(
            "expected merge opcode {EVENT_MERGE_OPCODE}, got {opcode}"
        )));
    }
    let update = from_opcode_value(&arr[1])?;
    let events_arr = arr[2]
        .as_array()
        .ok_or_else(|| WireError::MalformedFrame("events not an array".into()))?;
    let events = events_arr
        .iter()
        .map(from_opcode_value)
        .collect::<Result<_, _>>()?;
    Ok((update, events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionPayload, SnapshotValue};

    #[test]
    fn round_trips_through_msgpack() {
        let codec = MsgPackCodec;
        let msg = TransportMessage::Action(ActionPayload {
            request_id: "r1".into(),
            type_identifier: "increment".into(),
            payload: SnapshotValue::Int(1),
        });
        let bytes = codec.encode(&msg).expect("encode");
        let back = codec.decode(&bytes).expect("decode");
        assert_eq!(msg, back);
    }

    #[test]
    fn merged_frame_round_trips() {
        use crate::{EventDirection, EventPayload, StateUpdatePayload, UpdateKind};
        let update = TransportMessage::StateUpdate(StateUpdatePayload {
            kind: UpdateKind::Diff,
            patches: vec![],
            snapshot: None,
        });
        let event = TransportMessage::Event(EventPayload {
            direction: EventDirection::FromServer,
            event_type: "score".into(),
            payload: SnapshotValue::Int(1),
            raw_body: None,
        });
        let bytes = encode_merged(&update, std::slice::from_ref(&event)).expect("encode");
        let (back_update, back_events) = decode_merged(&bytes).expect("decode");
        assert_eq!(back_update, update);
        assert_eq!(back_events, vec![event]);
    }
}

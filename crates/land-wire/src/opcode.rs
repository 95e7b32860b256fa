// SPDX-License-Identifier: Apache-2.0
//! Frozen opcode table and the opcode-array JSON codec.
//!
//! The opcode-array form keeps the same information as the JSON-object
//! form but drops field names: `[kind, ...positional fields]`. Patch
//! subarrays use `[path, opOpcode, value?]`. Both this codec and
//! [`crate::MsgPackCodec`] build the same intermediate `serde_json::Value`
//! array and differ only in the final byte serializer, so the opcode
//! table cannot drift between the two.

use crate::{Patch, PatchOp, TransportMessage, WireError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Frozen message-kind opcodes (kinds numbered 1..7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageKind {
    /// `join`.
    Join = 1,
    /// `joinResponse`.
    JoinResponse = 2,
    /// `action`.
    Action = 3,
    /// `actionResponse`.
    ActionResponse = 4,
    /// `event`.
    Event = 5,
    /// `error`.
    Error = 6,
    /// `stateUpdate`.
    StateUpdate = 7,
}

impl MessageKind {
    fn of(msg: &TransportMessage) -> Self {
        match msg {
            TransportMessage::Join(_) => Self::Join,
            TransportMessage::JoinResponse(_) => Self::JoinResponse,
            TransportMessage::Action(_) => Self::Action,
            TransportMessage::ActionResponse(_) => Self::ActionResponse,
            TransportMessage::Event(_) => Self::Event,
            TransportMessage::Error(_) => Self::Error,
            TransportMessage::StateUpdate(_) => Self::StateUpdate,
        }
    }

    fn from_u8(v: u8) -> Result<Self, WireError> {
        match v {
            1 => Ok(Self::Join),
            2 => Ok(Self::JoinResponse),
            3 => Ok(Self::Action),
            4 => Ok(Self::ActionResponse),
            5 => Ok(Self::Event),
            6 => Ok(Self::Error),
            7 => Ok(Self::StateUpdate),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// Frozen `stateUpdate` kind opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum UpdateKind {
    /// No dirty fields this sync interval.
    NoChange = 0,
    /// First sync after join: a full snapshot.
    FirstSync = 1,
    /// Incremental or full diff against the peer's last snapshot.
    Diff = 2,
}

/// Opcode-array JSON codec: `[kind, ...payload]` instead of a tagged
/// object.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpcodeJsonCodec;

impl OpcodeJsonCodec {
    /// Encode a message into its opcode-array JSON string.
    pub fn encode(&self, msg: &TransportMessage) -> Result<String, WireError> {
        let value = to_opcode_value(msg)?;
        Ok(serde_json::to_string(&value)?)
    }

    /// Decode an opcode-array JSON string into a message.
    pub fn decode(&self, text: &str) -> Result<TransportMessage, WireError> {
        let value: Value = serde_json::from_str(text)?;
        from_opcode_value(&value)
    }
}

/// Build the shared `[kind, ...payload]` intermediate value. Reused by
/// both [`OpcodeJsonCodec`] and [`crate::MsgPackCodec`] so the wire shape
/// cannot diverge between the two encodings.
pub(crate) fn to_opcode_value(msg: &TransportMessage) -> Result<Value, WireError> {
    let kind = MessageKind::of(msg);
    let body = match msg {
        TransportMessage::Join(p) => serde_json::to_value(p)?,
        TransportMessage::JoinResponse(p) => serde_json::to_value(p)?,
        TransportMessage::Action(p) => serde_json::to_value(p)?,
        TransportMessage::ActionResponse(p) => serde_json::to_value(p)?,
        TransportMessage::Event(p) => serde_json::to_value(p)?,
        TransportMessage::Error(p) => serde_json::to_value(p)?,
        TransportMessage::StateUpdate(p) => {
            let patches: Vec<Value> = p.patches.iter().map(patch_to_opcode_value).collect();
            json!({
                "kind": p.kind,
                "patches": patches,
                "snapshot": p.snapshot,
            })
        }
    };
    Ok(json!([kind as u8, body]))
}

pub(crate) fn from_opcode_value(value: &Value) -> Result<TransportMessage, WireError> {
    let arr = value
        .as_array()
        .ok_or_else(|| WireError::MalformedFrame("expected top-level array".into()))?;
    if arr.len() != 2 {
        return Err(WireError::MalformedFrame(format!(
            "expected 2 elements, got {}",
            arr.len()
        )));
    }
    let kind_num = arr[0]
        .as_u64()
        .ok_or_else(|| WireError::MalformedFrame("opcode not a number".into()))?;
    let kind = MessageKind::from_u8(u8::try_from(kind_num).map_err(|_| {
        WireError::MalformedFrame(format!("opcode out of range: {kind_num}"))
    })?)?;
    let body = &arr[1];
    let msg = match kind {
        MessageKind::Join => TransportMessage::Join(serde_json::from_value(body.clone())?),
        MessageKind::JoinResponse => {
            TransportMessage::JoinResponse(serde_json::from_value(body.clone())?)
        }
        MessageKind::Action => TransportMessage::Action(serde_json::from_value(body.clone())?),
        MessageKind::ActionResponse => {
            TransportMessage::ActionResponse(serde_json::from_value(body.clone())?)
        }
        MessageKind::Event => TransportMessage::Event(serde_json::from_value(body.clone())?),
        MessageKind::Error => TransportMessage::Error(serde_json::from_value(body.clone())?),
        MessageKind::StateUpdate => {
            let update_kind = serde_json::from_value(
                body.get("kind")
                    .cloned()
                    .ok_or_else(|| WireError::MalformedFrame("missing update kind".into()))?,
            )?;
            let patches = body
                .get("patches")
                .and_then(Value::as_array)
                .ok_or_else(|| WireError::MalformedFrame("missing patches array".into()))?
                .iter()
                .map(patch_from_opcode_value)
                .collect::<Result<_, _>>()?;
            let snapshot = match body.get("snapshot") {
                Some(Value::Null) | None => None,
                Some(v) => Some(serde_json::from_value(v.clone())?),
            };
            TransportMessage::StateUpdate(crate::StateUpdatePayload {
                kind: update_kind,
                patches,
                snapshot,
            })
        }
    };
    Ok(msg)
}

fn patch_to_opcode_value(patch: &Patch) -> Value {
    json!([patch.path, patch.op.opcode(), patch.value])
}

fn patch_from_opcode_value(value: &Value) -> Result<Patch, WireError> {
    let arr = value
        .as_array()
        .ok_or_else(|| WireError::MalformedFrame("patch must be an array".into()))?;
    if arr.len() != 3 {
        return Err(WireError::MalformedFrame(format!(
            "patch array must have 3 elements, got {}",
            arr.len()
        )));
    }
    let path = arr[0]
        .as_str()
        .ok_or_else(|| WireError::MalformedFrame("patch path not a string".into()))?
        .to_string();
    let op_num = arr[1]
        .as_u64()
        .ok_or_else(|| WireError::MalformedFrame("patch op not a number".into()))?;
    let op = PatchOp::from_opcode(u8::try_from(op_num).map_err(|_| {
        WireError::MalformedFrame(format!("patch op out of range: {op_num}"))
    })?)?;
    let value = match &arr[2] {
        Value::Null => None,
        v => Some(serde_json::from_value(v.clone())?),
    };
    Ok(Patch { path, op, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionPayload, SnapshotValue};

    #[test]
    fn opcode_round_trip_preserves_message() {
        let msg = TransportMessage::Action(ActionPayload {
            request_id: "r1".into(),
            type_identifier: "increment".into(),
            payload: SnapshotValue::Null,
        });
        let codec = OpcodeJsonCodec;
        let text = codec.encode(&msg).expect("encode");
        let back = codec.decode(&text).expect("decode");
        assert_eq!(msg, back);
    }

    #[test]
    fn message_kind_opcodes_are_frozen() {
        assert_eq!(MessageKind::Join as u8, 1);
        assert_eq!(MessageKind::JoinResponse as u8, 2);
        assert_eq!(MessageKind::Action as u8, 3);
        assert_eq!(MessageKind::ActionResponse as u8, 4);
        assert_eq!(MessageKind::Event as u8, 5);
        assert_eq!(MessageKind::Error as u8, 6);
        assert_eq!(MessageKind::StateUpdate as u8, 7);
    }

    #[test]
    fn patch_opcodes_are_frozen() {
        assert_eq!(PatchOp::Set.opcode(), 1);
        assert_eq!(PatchOp::Delete.opcode(), 2);
        assert_eq!(PatchOp::Add.opcode(), 3);
    }
}

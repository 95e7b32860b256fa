// SPDX-License-Identifier: Apache-2.0
//! The `TransportMessage` frame shapes carried over the wire.

use crate::{value::SnapshotValue, Patch};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One frame of the client/server protocol.
///
/// `kind` (see [`crate::MessageKind`]) is frozen; adding a new frame shape
/// requires a new opcode, never renumbering an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TransportMessage {
    /// Client → server: request to bind this session to a Land.
    Join(JoinPayload),
    /// Server → client: result of a join request.
    JoinResponse(JoinResponsePayload),
    /// Client → server: a typed command.
    Action(ActionPayload),
    /// Server → client: the result of a previously submitted action.
    ActionResponse(ActionResponsePayload),
    /// Either direction: a fire-and-forget event.
    Event(EventPayload),
    /// Either direction: a typed, closed-taxonomy error.
    Error(ErrorPayload),
    /// Server → client: a state delta or full snapshot.
    StateUpdate(StateUpdatePayload),
}

/// `join` frame payload (C→S).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    /// Correlates with the eventual `joinResponse`.
    pub request_id: String,
    /// Target Land template.
    pub land_type: String,
    /// Target instance id; `None` requests auto-allocation.
    pub land_instance_id: Option<String>,
    /// Account-level identity, if authenticated.
    pub player_id: Option<String>,
    /// Device/client installation identity.
    pub device_id: Option<String>,
    /// Arbitrary join-time metadata.
    pub metadata: Option<BTreeMap<String, SnapshotValue>>,
    /// Wire encoding the client proposes for this session.
    pub encoding: Option<crate::Encoding>,
}

/// `joinResponse` frame payload (S→C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponsePayload {
    /// Echoes [`JoinPayload::request_id`].
    pub request_id: String,
    /// Whether the join succeeded.
    pub success: bool,
    /// Resolved Land template (on success).
    pub land_type: Option<String>,
    /// Resolved/allocated instance id (on success).
    pub land_instance_id: Option<String>,
    /// Fully-qualified `landType:instanceId` (on success).
    pub land_id: Option<String>,
    /// Assigned dense player slot (on success).
    pub player_slot: Option<u32>,
    /// Authoritative encoding for the remainder of the session (on success).
    pub encoding: Option<crate::Encoding>,
    /// Optional path-hash table for compressed patch paths.
    pub path_table: Option<Vec<(u32, String)>>,
    /// Failure reason (on failure); see `land-transport`'s error taxonomy.
    pub reason: Option<String>,
}

/// `action` frame payload (C→S).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPayload {
    /// Correlates with the eventual `actionResponse`.
    pub request_id: String,
    /// Action type identifier, dispatched by the Land's handler table.
    pub type_identifier: String,
    /// Action-specific payload.
    pub payload: SnapshotValue,
}

/// `actionResponse` frame payload (S→C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponsePayload {
    /// Echoes [`ActionPayload::request_id`].
    pub request_id: String,
    /// Handler-supplied response value.
    pub response: SnapshotValue,
}

/// Direction an [`EventPayload`] travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventDirection {
    /// Client-originated event.
    FromClient = 0,
    /// Server-originated event.
    FromServer = 1,
}

/// `event` frame payload (either direction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    /// Which side emitted this event.
    pub direction: EventDirection,
    /// Event type identifier.
    pub event_type: String,
    /// Event-specific payload.
    pub payload: SnapshotValue,
    /// Optional raw body, used for non-state-tree payloads (e.g. chat text).
    pub raw_body: Option<String>,
}

/// Closed error code taxonomy carried on `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Malformed or out-of-sequence frame.
    InvalidFrame,
    /// Missing or invalid authentication.
    Unauthorized,
    /// Command requires a joined session.
    NotJoined,
    /// Action `type_identifier` has no registered handler.
    UnknownAction,
    /// Land-internal invariant violation.
    Internal,
    /// Land is at `maxPlayers` capacity.
    LandFull,
    /// `LandID` does not exist and auto-create is disallowed.
    LandNotFound,
}

/// `error` frame payload (either direction, always server→client in
/// practice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Closed error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Optional machine-readable details.
    pub details: Option<SnapshotValue>,
    /// `request_id` of the command this error answers, if any.
    pub request_id: Option<String>,
}

/// `stateUpdate` frame payload (S→C).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdatePayload {
    /// Which of the three sync modes produced this frame.
    pub kind: crate::UpdateKind,
    /// Patches to apply (empty for `noChange`).
    pub patches: Vec<Patch>,
    /// Full snapshot, present only when `kind == firstSync`.
    pub snapshot: Option<SnapshotValue>,
}

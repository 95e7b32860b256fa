// SPDX-License-Identifier: Apache-2.0
//! Wire codecs and the canonical snapshot value model for the LandKeeper
//! runtime.
//!
//! Three equivalent encodings are supported and negotiated per session at
//! join time: a conventional JSON object form, a compact opcode-array JSON
//! form, and MessagePack over the same opcode-array shape. All three carry
//! the same closed [`SnapshotValue`] sum type and the same frozen opcode
//! table.

mod canonical;
mod json;
mod message;
mod msgpack;
mod opcode;
mod path_table;
mod value;

pub use canonical::{canonical_bytes, CanonicalError};
pub use json::JsonCodec;
pub use message::{
    ActionPayload, ActionResponsePayload, ErrorCode, ErrorPayload, EventDirection, EventPayload,
    JoinPayload, JoinResponsePayload, StateUpdatePayload, TransportMessage,
};
pub use msgpack::{decode_merged, encode_merged, MsgPackCodec};
pub use opcode::{MessageKind, OpcodeJsonCodec, UpdateKind};
pub use path_table::{PathCollision, PathHash, PathTable};
pub use value::{SnapshotValue, ToSnapshotValue};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Localized state change: an absolute path, an operation, and (for
/// `set`/`add`) the new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// JSON-Pointer-style absolute path (`/` separated, `~0`/`~1` escaped).
    pub path: String,
    /// The operation applied at `path`.
    pub op: PatchOp,
    /// New value for `set`/`add`; absent for `delete`.
    pub value: Option<SnapshotValue>,
}

/// The three patch operations a [`Patch`] may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchOp {
    /// Replace (or create) the value at `path`.
    Set,
    /// Remove the value at `path`.
    Delete,
    /// Insert a new entry at `path` (reactive-map/set insertion).
    Add,
}

impl PatchOp {
    /// The frozen opcode for this operation: set=1, remove=2, add=3.
    #[must_use]
    pub const fn opcode(self) -> u8 {
        match self {
            Self::Set => 1,
            Self::Delete => 2,
            Self::Add => 3,
        }
    }

    /// Parse an opcode back into a [`PatchOp`].
    pub fn from_opcode(code: u8) -> Result<Self, WireError> {
        match code {
            1 => Ok(Self::Set),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Add),
            other => Err(WireError::UnknownOpcode(other)),
        }
    }
}

/// Escape a single path segment (`~` → `~0`, `/` → `~1`).
#[must_use]
pub fn escape_path_segment(segment: &str) -> String {
    if segment.contains('~') || segment.contains('/') {
        segment.replace('~', "~0").replace('/', "~1")
    } else {
        segment.to_string()
    }
}

/// Append an escaped segment to a parent path, producing `""/foo"` ->
/// `"/foo/bar"` style absolute paths.
#[must_use]
pub fn join_path(parent: &str, segment: &str) -> String {
    format!("{parent}/{}", escape_path_segment(segment))
}

/// Errors produced while encoding or decoding wire frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON (de)serialization failed.
    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),
    /// MessagePack (de)serialization failed.
    #[error("msgpack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),
    /// MessagePack decode failed.
    #[error("msgpack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),
    /// A numeric opcode did not match a known message/patch/update kind.
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),
    /// A frame array did not carry the expected number/shape of elements.
    #[error("malformed opcode frame: {0}")]
    MalformedFrame(String),
    /// The canonical encoder rejected the value (see [`CanonicalError`]).
    #[error("canonical encoding error: {0}")]
    Canonical(#[from] CanonicalError),
}

/// One of the three negotiable wire encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Conventional JSON object encoding.
    Json,
    /// JSON arrays with a leading opcode.
    OpcodeJson,
    /// MessagePack over the same opcode-array shape.
    MessagePack,
}

impl Encoding {
    /// The wire name used in `joinResponse.encoding`.
    #[must_use]
    pub const fn wire_name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::OpcodeJson => "opcode_json",
            Self::MessagePack => "messagepack",
        }
    }
}

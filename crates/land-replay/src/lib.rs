// SPDX-License-Identifier: Apache-2.0
//! Per-tick replay recording and the hash-chain verifier for LandKeeper.
//!
//! A [`ReplayRecorder`] captures every input a running Keeper processed,
//! tick by tick, alongside an optional state hash; a [`ReplayRecord`] is
//! the resulting artifact, exportable as JSON or JSONL. [`verify_record`]
//! replays a recorded run against a fresh `Keeper` of the same
//! [`land_keeper::LandType`] and checks that the resulting state-hash
//! chain is internally reproducible (replaying twice yields the same
//! chain) and, where the record carries expected hashes, matches them.

mod hash;
mod record;
mod verifier;

pub use hash::hash_snapshot;
pub use record::{
    RecordedAction, RecordedClientEvent, RecordedLifecycleEvent, ReplayHeader, ReplayRecord,
    ReplayRecorder, TickRecord,
};
pub use verifier::{verify_record, MismatchDetail, VerifyReport};

// SPDX-License-Identifier: Apache-2.0
//! The recorded artifact: a header plus one entry per tick, each carrying
//! every action/client-event/lifecycle input processed that tick and
//! (optionally) the resulting state hash.
//!
//! Retention, rotation, and compression of recorded runs are a
//! deployment concern — this module only builds the in-memory record
//! and exports it; the caller decides what to do with the bytes.

use std::collections::BTreeMap;

use land_state::{ClientId, PlayerId, SessionId};
use land_wire::{ActionPayload, SnapshotValue};
use serde::{Deserialize, Serialize};

/// One recorded `action` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAction {
    /// The player who issued the action.
    pub player: String,
    /// The connection that carried it.
    pub client: String,
    /// The session it arrived on.
    pub session: u64,
    /// The action payload itself.
    pub payload: ActionPayload,
}

/// One recorded fire-and-forget client event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedClientEvent {
    /// The player who raised the event.
    pub player: String,
    /// The connection that carried it.
    pub client: String,
    /// The session it arrived on.
    pub session: u64,
    /// The event's type identifier.
    pub event_type: String,
    /// The event's payload.
    pub payload: SnapshotValue,
}

/// One recorded join or leave.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecordedLifecycleEvent {
    /// A player joined this tick.
    Join {
        /// The joining player.
        player: String,
        /// The connection that carried the join.
        client: String,
        /// The session the join arrived on.
        session: u64,
        /// Caller-supplied join metadata.
        metadata: Option<BTreeMap<String, SnapshotValue>>,
    },
    /// A player left this tick.
    Leave {
        /// The departing player.
        player: String,
    },
}

/// Every input processed during one tick, plus the resulting state hash
/// if one was computed for this tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickRecord {
    /// Monotonic tick counter, matching [`land_keeper::KeeperStats::tick_count`].
    pub tick_id: u64,
    /// Actions processed this tick, in arrival order.
    pub actions: Vec<RecordedAction>,
    /// Client events processed this tick, in arrival order.
    pub client_events: Vec<RecordedClientEvent>,
    /// Joins/leaves processed this tick, in arrival order.
    pub lifecycle_events: Vec<RecordedLifecycleEvent>,
    /// Hex-encoded `blake3` digest of the full state snapshot as of the
    /// end of this tick, if state hashing was enabled for this run.
    pub state_hash: Option<String>,
}

impl TickRecord {
    /// Start a fresh, empty record for `tick_id`.
    #[must_use]
    pub fn new(tick_id: u64) -> Self {
        Self {
            tick_id,
            ..Self::default()
        }
    }
}

/// Identifying metadata for a recorded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayHeader {
    /// The `LandType` this run exercised.
    pub land_type: String,
    /// Free-form description of the machine/process the run came from,
    /// for cross-platform-determinism comparisons.
    pub hardware_info: Option<String>,
    /// The seed this run's injected rng was started with. A verifier must
    /// reuse this seed to reproduce the same random draws.
    pub rng_seed: u64,
}

/// A complete recorded run: header plus one [`TickRecord`] per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayRecord {
    /// Run-identifying metadata.
    pub header: ReplayHeader,
    /// One entry per tick, in order.
    pub ticks: Vec<TickRecord>,
}

impl ReplayRecord {
    /// Serialize the whole record as a single pretty-printed JSON document.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize as JSONL: one header line, then one line per tick. Suited
    /// to streaming a long-running Land's record to disk incrementally.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        out.push_str(&serde_json::to_string(&self.header)?);
        out.push('\n');
        for tick in &self.ticks {
            out.push_str(&serde_json::to_string(tick)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Accumulates one [`ReplayRecord`] as a Land is driven, tick by tick.
///
/// The recorder has no knowledge of a live [`land_keeper::Keeper`] — the
/// caller (normally `land-transport`/`land-realm`, wherever commands are
/// actually dispatched) pushes each input as it is handled and calls
/// [`ReplayRecorder::finish_tick`] once that tick's Sync Engine pass has
/// run, supplying the resulting state hash if hashing is enabled for this
/// run.
#[derive(Debug)]
pub struct ReplayRecorder {
    header: ReplayHeader,
    ticks: Vec<TickRecord>,
    current: TickRecord,
}

impl ReplayRecorder {
    /// Start a fresh recorder for a run beginning at tick 0.
    #[must_use]
    pub fn new(land_type: impl Into<String>, rng_seed: u64, hardware_info: Option<String>) -> Self {
        Self {
            header: ReplayHeader {
                land_type: land_type.into(),
                hardware_info,
                rng_seed,
            },
            ticks: Vec::new(),
            current: TickRecord::new(0),
        }
    }

    /// Record an action about to be dispatched this tick.
    pub fn record_action(&mut self, player: &PlayerId, client: &ClientId, session: SessionId, payload: ActionPayload) {
        self.current.actions.push(RecordedAction {
            player: player.to_string(),
            client: client.to_string(),
            session: session.as_raw(),
            payload,
        });
    }

    /// Record a client event about to be dispatched this tick.
    pub fn record_client_event(
        &mut self,
        player: &PlayerId,
        client: &ClientId,
        session: SessionId,
        event_type: impl Into<String>,
        payload: SnapshotValue,
    ) {
        self.current.client_events.push(RecordedClientEvent {
            player: player.to_string(),
            client: client.to_string(),
            session: session.as_raw(),
            event_type: event_type.into(),
            payload,
        });
    }

    /// Record a join about to be dispatched this tick.
    pub fn record_join(
        &mut self,
        player: &PlayerId,
        client: &ClientId,
        session: SessionId,
        metadata: Option<BTreeMap<String, SnapshotValue>>,
    ) {
        self.current.lifecycle_events.push(RecordedLifecycleEvent::Join {
            player: player.to_string(),
            client: client.to_string(),
            session: session.as_raw(),
            metadata,
        });
    }

    /// Record a leave about to be dispatched this tick.
    pub fn record_leave(&mut self, player: &PlayerId) {
        self.current
            .lifecycle_events
            .push(RecordedLifecycleEvent::Leave {
                player: player.to_string(),
            });
    }

    /// Close out the current tick with its resulting state hash (or
    /// `None` if hashing is disabled for this run) and start the next.
    pub fn finish_tick(&mut self, state_hash: Option<String>) {
        let tick_id = self.current.tick_id;
        self.current.state_hash = state_hash;
        let finished = std::mem::replace(&mut self.current, TickRecord::new(tick_id + 1));
        self.ticks.push(finished);
    }

    /// Consume the recorder and produce the finished [`ReplayRecord`].
    /// Any in-progress tick with no inputs and no hash is dropped rather
    /// than emitted as a trailing empty entry.
    #[must_use]
    pub fn finish(mut self) -> ReplayRecord {
        if self.current.actions.is_empty()
            && self.current.client_events.is_empty()
            && self.current.lifecycle_events.is_empty()
            && self.current.state_hash.is_none()
        {
            return ReplayRecord {
                header: self.header,
                ticks: self.ticks,
            };
        }
        self.ticks.push(std::mem::take(&mut self.current));
        ReplayRecord {
            header: self.header,
            ticks: self.ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_trailing_tick_is_dropped_on_finish() {
        let mut recorder = ReplayRecorder::new("counter", 0, None);
        recorder.finish_tick(Some("abc".into()));
        let record = recorder.finish();
        assert_eq!(record.ticks.len(), 1);
    }

    #[test]
    fn lifecycle_and_action_land_in_the_right_tick() {
        let mut recorder = ReplayRecorder::new("counter", 42, None);
        let player = PlayerId::from("p1");
        let client = ClientId::from("c1");
        recorder.record_join(&player, &client, SessionId::from_raw(0), None);
        recorder.record_action(
            &player,
            &client,
            SessionId::from_raw(0),
            ActionPayload {
                request_id: "r1".into(),
                type_identifier: "increment".into(),
                payload: SnapshotValue::Null,
            },
        );
        recorder.finish_tick(Some("hash0".into()));
        let record = recorder.finish();
        assert_eq!(record.ticks[0].lifecycle_events.len(), 1);
        assert_eq!(record.ticks[0].actions.len(), 1);
        assert_eq!(record.ticks[0].state_hash.as_deref(), Some("hash0"));
    }

    #[test]
    fn jsonl_has_one_line_per_tick_plus_header() {
        let mut recorder = ReplayRecorder::new("counter", 1, None);
        recorder.finish_tick(None);
        recorder.finish_tick(None);
        let record = recorder.finish();
        let jsonl = record.to_jsonl().expect("serialize");
        assert_eq!(jsonl.lines().count(), 3);
    }
}

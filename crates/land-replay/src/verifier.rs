// SPDX-License-Identifier: Apache-2.0
//! Re-runs a recorded [`ReplayRecord`] against a fresh `Keeper` and
//! checks the resulting hash chain: construct a fresh Keeper, replay the
//! recorded inputs tick by tick, and assert the recomputed hash chain
//! matches the recorded one.

use land_keeper::{KeeperConfig, LandType};
use land_state::{ClientId, LandId, PlayerId, SessionId};
use land_wire::ActionPayload;

use crate::hash::hash_snapshot;
use crate::record::{RecordedLifecycleEvent, ReplayRecord};

/// Where a replayed run's state-hash chain diverged from the recorded
/// expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchDetail {
    /// The tick at which the hashes first disagreed.
    pub tick_id: u64,
    /// The hash recorded in the [`ReplayRecord`].
    pub expected: String,
    /// The hash produced by replaying the record.
    pub actual: String,
}

/// Result of replaying a [`ReplayRecord`] against a fresh Keeper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of ticks whose hash was computed and compared.
    pub ticks_checked: usize,
    /// The first tick whose replayed hash disagreed with the recorded
    /// one, if any.
    pub first_mismatch: Option<MismatchDetail>,
    /// `true` if two independent replays of the same record produced an
    /// identical hash chain (the internal-determinism property).
    pub internal_determinism_ok: bool,
}

impl VerifyReport {
    /// `true` if the record replayed cleanly: every recorded hash matched
    /// and the run is internally deterministic.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.first_mismatch.is_none() && self.internal_determinism_ok
    }
}

/// Replay `record` twice against a fresh `L`-typed Keeper and report
/// whether the resulting state-hash chains are internally reproducible
/// and match any hashes the record itself carries.
///
/// `config` should normally set `tick_interval: None` — the verifier
/// drives ticks explicitly via [`land_keeper::KeeperHandle::force_tick`]
/// rather than on a wall-clock schedule, so replay timing never depends
/// on how fast this machine happens to run.
#[must_use]
pub fn verify_record<L: LandType>(record: &ReplayRecord, config: &KeeperConfig) -> VerifyReport {
    let chain_a = run_once::<L>(record, config);
    let chain_b = run_once::<L>(record, config);
    let internal_determinism_ok = chain_a == chain_b;

    let first_mismatch = record
        .ticks
        .iter()
        .zip(chain_a.iter())
        .find_map(|(tick, actual)| {
            let expected = tick.state_hash.as_ref()?;
            (expected != actual).then(|| MismatchDetail {
                tick_id: tick.tick_id,
                expected: expected.clone(),
                actual: actual.clone(),
            })
        });

    VerifyReport {
        ticks_checked: chain_a.len(),
        first_mismatch,
        internal_determinism_ok,
    }
}

fn run_once<L: LandType>(record: &ReplayRecord, config: &KeeperConfig) -> Vec<String> {
    #[allow(clippy::expect_used)] // Documented panic: a runtime this call owns exclusively has no fallback path.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("building a current-thread runtime for replay verification");
    let local = tokio::task::LocalSet::new();
    local.block_on(&runtime, async {
        let land_id = LandId::new(record.header.land_type.clone(), "replay");
        let mut keeper_config = config.clone();
        keeper_config.tick_interval = None;
        keeper_config.rng_seed = record.header.rng_seed;
        let (handle, mut outputs) = land_keeper::spawn_local::<L>(land_id, keeper_config, &local);

        let mut chain = Vec::with_capacity(record.ticks.len());
        for tick in &record.ticks {
            for lifecycle in &tick.lifecycle_events {
                match lifecycle {
                    RecordedLifecycleEvent::Join {
                        player,
                        client,
                        session,
                        metadata,
                    } => {
                        let _ = handle
                            .join(
                                SessionId::from_raw(*session),
                                ClientId::from(client.as_str()),
                                PlayerId::from(player.as_str()),
                                metadata.clone(),
                            )
                            .await;
                    }
                    RecordedLifecycleEvent::Leave { player } => {
                        handle.leave(PlayerId::from(player.as_str())).await;
                    }
                }
            }
            for action in &tick.actions {
                let payload = ActionPayload {
                    request_id: action.payload.request_id.clone(),
                    type_identifier: action.payload.type_identifier.clone(),
                    payload: action.payload.payload.clone(),
                };
                let _ = handle
                    .action(
                        SessionId::from_raw(action.session),
                        ClientId::from(action.client.as_str()),
                        PlayerId::from(action.player.as_str()),
                        payload,
                    )
                    .await;
            }
            for event in &tick.client_events {
                let _ = handle
                    .client_event(
                        SessionId::from_raw(event.session),
                        ClientId::from(event.client.as_str()),
                        PlayerId::from(event.player.as_str()),
                        event.event_type.clone(),
                        event.payload.clone(),
                    )
                    .await;
            }

            handle.force_tick().await;
            let snapshot = handle.snapshot().await.unwrap_or(land_wire::SnapshotValue::Null);
            chain.push(hash_snapshot(&snapshot).unwrap_or_default());
        }

        handle.shutdown().await;
        // Drain so the Keeper's background thread cannot outlive this
        // LocalSet; the `Terminated` marker is the last output it sends.
        while let Some(out) = outputs.recv().await {
            if matches!(out, land_keeper::KeeperOutput::Terminated) {
                break;
            }
        }
        chain
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReplayRecorder;
    use land_keeper::{HandlerDef, HandlerTable, ResolverCtx};
    use land_state::{Cursor, Field, Snapshot, StateSchema, SyncPolicy};
    use land_wire::SnapshotValue;
    use std::collections::BTreeMap as Map;

    struct CounterState {
        count: Field<i64>,
    }

    impl Snapshot for CounterState {
        fn to_snapshot(&self) -> SnapshotValue {
            let mut map = Map::new();
            map.insert("count".to_string(), self.count.to_snapshot());
            SnapshotValue::Map(map)
        }
    }

    struct CounterLand;

    impl LandType for CounterLand {
        type State = CounterState;
        const TYPE_NAME: &'static str = "counter";

        fn schema() -> StateSchema {
            StateSchema::new().field("/count", SyncPolicy::Broadcast)
        }

        fn init(_cursor: &Cursor) -> Self::State {
            CounterState {
                count: Field::new(0_i64, SyncPolicy::Broadcast),
            }
        }

        fn action_handlers() -> HandlerTable<Self::State> {
            let mut table = HandlerTable::new();
            table.insert(
                "increment".to_string(),
                HandlerDef {
                    resolvers: Vec::new(),
                    run: Box::new(|state, cursor, _payload, _ctx| {
                        let next = *state.count.get() + 1;
                        state.count.set(cursor, "count", next);
                        Ok(SnapshotValue::Int(next))
                    }),
                },
            );
            table
        }
    }

    #[test]
    fn replaying_the_same_actions_twice_is_deterministic() {
        let mut recorder = ReplayRecorder::new("counter", 0, None);
        let player = PlayerId::from("p1");
        let client = ClientId::from("c1");
        recorder.record_join(&player, &client, SessionId::from_raw(0), None);
        for _ in 0..3 {
            recorder.record_action(
                &player,
                &client,
                SessionId::from_raw(0),
                ActionPayload {
                    request_id: "r".into(),
                    type_identifier: "increment".into(),
                    payload: SnapshotValue::Null,
                },
            );
            recorder.finish_tick(None);
        }
        let record = recorder.finish();

        let report = verify_record::<CounterLand>(&record, &KeeperConfig::default());
        assert!(report.internal_determinism_ok);
        assert_eq!(report.ticks_checked, 3);
    }
}

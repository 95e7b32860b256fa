// SPDX-License-Identifier: Apache-2.0
//! `arena`: a Land with per-player private state — each joined player's
//! own `score` is visible only to themselves, exercising the
//! `perPlayer { score: int }` shape. `on_join` seeds a fresh entry,
//! `on_leave` removes it, and the `score` action mutates a player's own
//! entry in place via [`land_state::ReactiveMap::get_mut`].

use land_keeper::{HandlerDef, HandlerTable, LandType, TargetSelector};
use land_state::{Cursor, Field, PlayerId, PlayerSlot, ReactiveMap, Snapshot, StateSchema, SyncPolicy};
use land_wire::SnapshotValue;

/// One player's private state within an `arena` instance.
pub struct PlayerEntry {
    score: Field<i64>,
}

impl Snapshot for PlayerEntry {
    fn to_snapshot(&self) -> SnapshotValue {
        SnapshotValue::map([("score", self.score.to_snapshot())])
    }
}

/// `arena`'s entire state: a roster of joined players, each with their own
/// private score.
pub struct ArenaState {
    players: ReactiveMap<PlayerEntry>,
}

impl ArenaState {
    /// The current score for `player`, if they are present in the roster.
    #[must_use]
    pub fn score_of(&self, player: &str) -> Option<i64> {
        self.players.get(player).map(|entry| *entry.score.get())
    }
}

impl Snapshot for ArenaState {
    fn to_snapshot(&self) -> SnapshotValue {
        SnapshotValue::map([("players", self.players.to_snapshot())])
    }
}

/// A shared arena where every joined player sees only their own score.
pub struct ArenaLand;

impl LandType for ArenaLand {
    type State = ArenaState;
    const TYPE_NAME: &'static str = "arena";

    fn schema() -> StateSchema {
        StateSchema::new().field("/players", SyncPolicy::PerPlayer)
    }

    fn init(_cursor: &Cursor) -> Self::State {
        ArenaState {
            players: ReactiveMap::new(SyncPolicy::PerPlayer),
        }
    }

    fn action_handlers() -> HandlerTable<Self::State> {
        let mut table = HandlerTable::new();
        table.insert(
            "score".to_string(),
            HandlerDef {
                resolvers: Vec::new(),
                run: Box::new(|state, cursor, payload, ctx| {
                    let delta = score_delta(&payload);
                    let key = ctx.player.as_str().to_string();
                    let entry_cursor = state.players.entry_cursor(cursor, "players", &key);
                    let Some(entry) = state.players.get_mut(&key) else {
                        return Err(land_keeper::HandlerError::Validation(
                            "player is not present in the roster".to_string(),
                        ));
                    };
                    let next = *entry.score.get() + delta;
                    entry.score.set(&entry_cursor, "score", next);
                    Ok(SnapshotValue::Int(next))
                }),
            },
        );
        table
    }

    fn event_handlers() -> HandlerTable<Self::State> {
        let mut table = HandlerTable::new();
        table.insert(
            "ping".to_string(),
            HandlerDef {
                resolvers: Vec::new(),
                run: Box::new(|_state, _cursor, payload, ctx| {
                    ctx.send_event(TargetSelector::Others(ctx.player.clone()), "ping", payload);
                    Ok(SnapshotValue::Null)
                }),
            },
        );
        table
    }

    fn on_join(state: &mut Self::State, cursor: &Cursor, player: &PlayerId, _slot: PlayerSlot) {
        state.players.set(
            cursor,
            "players",
            player.as_str(),
            PlayerEntry {
                score: Field::new(0, SyncPolicy::Broadcast),
            },
        );
    }

    fn on_leave(state: &mut Self::State, cursor: &Cursor, player: &PlayerId) {
        state.players.remove(cursor, "players", player.as_str());
    }
}

/// `{"delta": N}` adjusts the score by `N`; any other payload is a no-op
/// adjustment of zero.
fn score_delta(payload: &SnapshotValue) -> i64 {
    match payload {
        SnapshotValue::Map(fields) => match fields.get("delta") {
            Some(SnapshotValue::Int(n)) => *n,
            _ => 0,
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_keeper::KeeperConfig;
    use land_realm::{Realm, RegisteredType};
    use land_state::{ClientId, LandId, SessionId};
    use land_sync::FieldPolicyTable;
    use land_wire::ActionPayload;
    use std::time::Duration;

    fn test_config() -> KeeperConfig {
        KeeperConfig {
            tick_interval: None,
            idle_timeout: Duration::from_secs(60),
            ..KeeperConfig::default()
        }
    }

    #[tokio::test]
    async fn score_action_mutates_only_the_caller_entry() {
        let realm = Realm::new();
        realm
            .register("arena", RegisteredType::new::<ArenaLand>(test_config(), true))
            .await
            .unwrap();
        let handle = realm.route(LandId::new("arena", "room-1")).await.unwrap();

        let p1 = PlayerId::from("p1");
        let p2 = PlayerId::from("p2");
        handle
            .join(SessionId::from_raw(0), ClientId::from("c1"), p1.clone(), None)
            .await
            .unwrap();
        handle
            .join(SessionId::from_raw(1), ClientId::from("c2"), p2.clone(), None)
            .await
            .unwrap();

        let result = handle
            .action(
                SessionId::from_raw(0),
                ClientId::from("c1"),
                p1,
                ActionPayload {
                    request_id: "r1".into(),
                    type_identifier: "score".into(),
                    payload: SnapshotValue::map([("delta", SnapshotValue::Int(7))]),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, SnapshotValue::Int(7));

        let snapshot = handle.snapshot().await.unwrap();
        let SnapshotValue::Map(root) = snapshot else {
            panic!("expected map");
        };
        let SnapshotValue::Map(players) = &root["players"] else {
            panic!("expected nested map");
        };
        let SnapshotValue::Map(p1_entry) = &players["p1"] else {
            panic!("expected p1 entry");
        };
        assert_eq!(p1_entry.get("score"), Some(&SnapshotValue::Int(7)));
        let SnapshotValue::Map(p2_entry) = &players["p2"] else {
            panic!("expected p2 entry");
        };
        assert_eq!(p2_entry.get("score"), Some(&SnapshotValue::Int(0)));
    }

    #[tokio::test]
    async fn leave_removes_the_player_from_the_roster() {
        let realm = Realm::new();
        realm
            .register("arena", RegisteredType::new::<ArenaLand>(test_config(), true))
            .await
            .unwrap();
        let handle = realm.route(LandId::new("arena", "room-1")).await.unwrap();

        let p1 = PlayerId::from("p1");
        handle
            .join(SessionId::from_raw(0), ClientId::from("c1"), p1.clone(), None)
            .await
            .unwrap();
        handle.leave(p1).await;

        let snapshot = handle.snapshot().await.unwrap();
        let SnapshotValue::Map(root) = snapshot else {
            panic!("expected map");
        };
        let SnapshotValue::Map(players) = &root["players"] else {
            panic!("expected nested map");
        };
        assert!(players.is_empty());
    }

    #[test]
    fn schema_scopes_the_players_subtree_per_player() {
        let table = FieldPolicyTable::from_schema(&ArenaLand::schema());
        assert_eq!(table.policy_for("/players"), SyncPolicy::PerPlayer);
        assert_eq!(table.policy_for("/players/p1/score"), SyncPolicy::PerPlayer);
    }
}

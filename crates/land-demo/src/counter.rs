// SPDX-License-Identifier: Apache-2.0
//! `counter`: the simplest Land — one broadcast integer, bumped by an
//! `increment` action and zeroed by a `reset` client event. Grounded in the
//! `CounterLand`/`CounterState` fixture `land-realm` and `land-replay` each
//! redeclare inline for their own tests; this is the one copy meant to be
//! registered with a live `Realm`.

use land_keeper::{HandlerDef, HandlerTable, LandType};
use land_state::{Cursor, Field, Snapshot, StateSchema, SyncPolicy};
use land_wire::SnapshotValue;

/// `counter`'s entire state: one broadcast integer.
pub struct CounterState {
    count: Field<i64>,
}

impl CounterState {
    /// The current count.
    #[must_use]
    pub fn count(&self) -> i64 {
        *self.count.get()
    }
}

impl Snapshot for CounterState {
    fn to_snapshot(&self) -> SnapshotValue {
        SnapshotValue::map([("count", self.count.to_snapshot())])
    }
}

/// A single shared counter every joined player can increment or reset.
pub struct CounterLand;

impl LandType for CounterLand {
    type State = CounterState;
    const TYPE_NAME: &'static str = "counter";

    fn schema() -> StateSchema {
        StateSchema::new().field("/count", SyncPolicy::Broadcast)
    }

    fn init(_cursor: &Cursor) -> Self::State {
        CounterState {
            count: Field::new(0, SyncPolicy::Broadcast),
        }
    }

    fn action_handlers() -> HandlerTable<Self::State> {
        let mut table = HandlerTable::new();
        table.insert(
            "increment".to_string(),
            HandlerDef {
                resolvers: Vec::new(),
                run: Box::new(|state, cursor, payload, _ctx| {
                    let next = *state.count.get() + increment_amount(&payload);
                    state.count.set(cursor, "count", next);
                    Ok(SnapshotValue::Int(next))
                }),
            },
        );
        table
    }

    fn event_handlers() -> HandlerTable<Self::State> {
        let mut table = HandlerTable::new();
        table.insert(
            "reset".to_string(),
            HandlerDef {
                resolvers: Vec::new(),
                run: Box::new(|state, cursor, _payload, _ctx| {
                    state.count.set(cursor, "count", 0);
                    Ok(SnapshotValue::Null)
                }),
            },
        );
        table
    }
}

/// `{"by": N}` increments by `N`; any other payload (including `Null`,
/// the wire default for an action carrying no arguments) increments by 1.
fn increment_amount(payload: &SnapshotValue) -> i64 {
    match payload {
        SnapshotValue::Map(fields) => match fields.get("by") {
            Some(SnapshotValue::Int(n)) => *n,
            _ => 1,
        },
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_keeper::KeeperConfig;
    use land_realm::Realm;
    use land_realm::RegisteredType;
    use land_state::{ClientId, LandId, PlayerId, SessionId};
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
    async fn increment_with_no_payload_defaults_to_one() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();
        let handle = realm.route(LandId::new("counter", "room-1")).await.unwrap();
        let player = PlayerId::from("p1");
        handle
            .join(SessionId::from_raw(0), ClientId::from("c1"), player.clone(), None)
            .await
            .unwrap();

        let result = handle
            .action(
                SessionId::from_raw(0),
                ClientId::from("c1"),
                player,
                ActionPayload {
                    request_id: "r1".into(),
                    type_identifier: "increment".into(),
                    payload: SnapshotValue::Null,
                },
            )
            .await
            .unwrap();
        assert_eq!(result, SnapshotValue::Int(1));
    }

    #[tokio::test]
    async fn increment_honors_explicit_by_field() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();
        let handle = realm.route(LandId::new("counter", "room-1")).await.unwrap();
        let player = PlayerId::from("p1");
        handle
            .join(SessionId::from_raw(0), ClientId::from("c1"), player.clone(), None)
            .await
            .unwrap();

        let result = handle
            .action(
                SessionId::from_raw(0),
                ClientId::from("c1"),
                player,
                ActionPayload {
                    request_id: "r1".into(),
                    type_identifier: "increment".into(),
                    payload: SnapshotValue::map([("by", SnapshotValue::Int(5))]),
                },
            )
            .await
            .unwrap();
        assert_eq!(result, SnapshotValue::Int(5));
    }

    #[tokio::test]
    async fn reset_event_zeroes_the_count() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();
        let handle = realm.route(LandId::new("counter", "room-1")).await.unwrap();
        let player = PlayerId::from("p1");
        handle
            .join(SessionId::from_raw(0), ClientId::from("c1"), player.clone(), None)
            .await
            .unwrap();
        handle
            .action(
                SessionId::from_raw(0),
                ClientId::from("c1"),
                player.clone(),
                ActionPayload {
                    request_id: "r1".into(),
                    type_identifier: "increment".into(),
                    payload: SnapshotValue::Null,
                },
            )
            .await
            .unwrap();

        handle
            .client_event(
                SessionId::from_raw(0),
                ClientId::from("c1"),
                player,
                "reset",
                SnapshotValue::Null,
            )
            .await
            .unwrap();

        let snapshot = handle.snapshot().await.unwrap();
        let SnapshotValue::Map(fields) = snapshot else {
            panic!("expected map snapshot");
        };
        assert_eq!(fields.get("count"), Some(&SnapshotValue::Int(0)));
    }
}

// SPDX-License-Identifier: Apache-2.0
//! End-to-end walkthroughs of key join/sync/teardown scenarios, driving
//! `land-demo`'s fixtures through a live `Realm` the way a
//! `land-transport` session would (minus the wire codec itself, which
//! `land-wire` already round-trips in its own unit tests).

use std::time::Duration;

use land_demo::{ArenaLand, CounterLand};
use land_keeper::{KeeperConfig, KeeperOutput};
use land_realm::{LandStatus, Realm, RegisteredType};
use land_state::{ClientId, LandId, PlayerId, SessionId};
use land_wire::{ActionPayload, SnapshotValue, UpdateKind};

fn ticking_config(tick: Duration, idle: Duration) -> KeeperConfig {
    KeeperConfig {
        tick_interval: Some(tick),
        idle_timeout: idle,
        ..KeeperConfig::default()
    }
}

/// Solo join, two increments, the next tick carries exactly the
/// accumulated diff.
#[tokio::test]
async fn solo_join_and_click_produces_a_diff_on_the_next_tick() {
    let realm = Realm::new();
    realm
        .register(
            "counter",
            RegisteredType::new::<CounterLand>(ticking_config(Duration::from_millis(20), Duration::from_secs(60)), true),
        )
        .await
        .unwrap();

    let land_id = LandId::new("counter", "inst-a");
    let handle = realm.route(land_id.clone()).await.unwrap();
    let mut outputs = realm.subscribe(&land_id).await.unwrap();

    let player = PlayerId::from("p1");
    let outcome = handle
        .join(SessionId::from_raw(0), ClientId::from("c1"), player.clone(), None)
        .await
        .unwrap();
    assert_eq!(outcome.slot.as_raw(), 0);

    // First sync after join: full snapshot, count still zero.
    let first = next_state_update_for(&mut outputs, &player).await;
    assert_eq!(first.kind, UpdateKind::FirstSync);
    assert_eq!(first.snapshot, Some(SnapshotValue::map([("count", SnapshotValue::Int(0))])));

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
        .action(
            SessionId::from_raw(0),
            ClientId::from("c1"),
            player.clone(),
            ActionPayload {
                request_id: "r2".into(),
                type_identifier: "increment".into(),
                payload: SnapshotValue::Null,
            },
        )
        .await
        .unwrap();

    // Both increments land in the same patch-recording window (neither
    // handler requests an immediate sync), so the tick emits one patch per
    // mutation rather than a single coalesced value — the last one is the
    // accumulated count.
    let diff = next_state_update_for(&mut outputs, &player).await;
    assert_eq!(diff.kind, UpdateKind::Diff);
    assert_eq!(diff.patches.len(), 2);
    assert!(diff.patches.iter().all(|patch| patch.path == "/count"));
    assert_eq!(diff.patches[0].value, Some(SnapshotValue::Int(1)));
    assert_eq!(diff.patches[1].value, Some(SnapshotValue::Int(2)));
}

/// Two players join an `arena`; an action from P1 only produces a
/// non-empty diff for P1, never for P2.
#[tokio::test]
async fn private_state_mutation_is_never_visible_to_the_other_player() {
    let realm = Realm::new();
    realm
        .register(
            "arena",
            RegisteredType::new::<ArenaLand>(ticking_config(Duration::from_millis(20), Duration::from_secs(60)), true),
        )
        .await
        .unwrap();

    let land_id = LandId::new("arena", "inst-a");
    let handle = realm.route(land_id.clone()).await.unwrap();
    let mut outputs = realm.subscribe(&land_id).await.unwrap();

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

    // Drain the two firstSync frames (one per joined player).
    let _ = next_state_update_for(&mut outputs, &p1).await;
    let _ = next_state_update_for(&mut outputs, &p2).await;

    handle
        .action(
            SessionId::from_raw(0),
            ClientId::from("c1"),
            p1.clone(),
            ActionPayload {
                request_id: "r1".into(),
                type_identifier: "score".into(),
                payload: SnapshotValue::map([("delta", SnapshotValue::Int(10))]),
            },
        )
        .await
        .unwrap();

    let p1_update = next_state_update_for(&mut outputs, &p1).await;
    assert_eq!(p1_update.kind, UpdateKind::Diff);
    assert_eq!(p1_update.patches.len(), 1);
    assert_eq!(p1_update.patches[0].path, "/players/p1/score");

    // P2 has nothing visible to sync and no heartbeat is due yet, so the
    // engine omits P2's frame entirely this tick rather than sending an
    // explicit empty noChange — either way, P2 must never see P1's patch.
    let p2_saw_nothing = tokio::time::timeout(Duration::from_millis(100), next_state_update_for(&mut outputs, &p2))
        .await
        .is_err();
    assert!(p2_saw_nothing, "P2 must not receive P1's private patch");
}

/// Auto-create on join, idle teardown once empty, and a subsequent join
/// recreating a fresh instance.
#[tokio::test]
async fn auto_created_land_tears_down_when_idle_then_a_later_join_recreates_it() {
    let realm = Realm::new();
    realm
        .register(
            "counter",
            RegisteredType::new::<CounterLand>(ticking_config(Duration::from_millis(10), Duration::from_millis(80)), true),
        )
        .await
        .unwrap();

    let land_id = LandId::new("counter", "room-42");
    let handle = realm.route(land_id.clone()).await.unwrap();
    let player = PlayerId::from("p1");
    handle
        .join(SessionId::from_raw(0), ClientId::from("c1"), player.clone(), None)
        .await
        .unwrap();
    assert_eq!(realm.list().await.len(), 1);

    handle.leave(player.clone()).await;

    // Idle timeout is 80ms; give the Keeper's own idle-check loop time to
    // notice and self-evict through the Realm.
    for _ in 0..20 {
        if realm.list().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(realm.list().await.is_empty(), "land did not evict after idle timeout");

    // The old handle's Keeper has actually terminated, not merely been
    // reused: its command channel is gone.
    let stale_action = handle
        .action(
            SessionId::from_raw(0),
            ClientId::from("c1"),
            player,
            ActionPayload {
                request_id: "stale".into(),
                type_identifier: "increment".into(),
                payload: SnapshotValue::Null,
            },
        )
        .await;
    assert!(matches!(stale_action, Err(land_keeper::ActionError::ShuttingDown)));

    let recreated = realm.route(land_id.clone()).await.unwrap();
    let listing = realm.list().await;
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].status, LandStatus::Running);

    let snapshot = recreated.snapshot().await.unwrap();
    let SnapshotValue::Map(fields) = snapshot else {
        panic!("expected map snapshot");
    };
    assert_eq!(fields.get("count"), Some(&SnapshotValue::Int(0)));
}

async fn next_state_update_for(
    outputs: &mut tokio::sync::broadcast::Receiver<KeeperOutput>,
    player: &PlayerId,
) -> land_wire::StateUpdatePayload {
    loop {
        match outputs.recv().await.expect("keeper output stream closed") {
            KeeperOutput::StateUpdate { player: who, payload } if &who == player => return payload,
            KeeperOutput::StateUpdate { .. } | KeeperOutput::ServerEvent { .. } => continue,
            KeeperOutput::Terminated => panic!("keeper terminated before emitting an update"),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
//! The per-Land Sync Engine: one instance per Keeper, driven once per
//! tick.

use std::collections::BTreeMap;

use land_state::{PatchScope, PlayerId, ScopedPatch};
use land_wire::{Patch, SnapshotValue, StateUpdatePayload, UpdateKind};

use crate::diff::{diff_snapshot, subtree_at};
use crate::mode::{AdaptiveState, DirtyTrackingMode, SyncMode};
use crate::visibility::FieldPolicyTable;

struct PlayerSyncState {
    has_synced: bool,
    last_visible_snapshot: SnapshotValue,
}

impl PlayerSyncState {
    const fn new() -> Self {
        Self {
            has_synced: false,
            last_visible_snapshot: SnapshotValue::Null,
        }
    }
}

/// Drives mode selection, diffing, and per-player visibility filtering
/// for one Land across its lifetime. Owned by that Land's Keeper; never
/// shared across Lands.
pub struct SyncEngine {
    dirty_tracking: DirtyTrackingMode,
    adaptive: AdaptiveState,
    heartbeat_every_ticks: u32,
    ticks_since_heartbeat: u32,
    players: BTreeMap<PlayerId, PlayerSyncState>,
}

impl SyncEngine {
    /// Start a fresh engine. `heartbeat_every_ticks == 0` disables the
    /// periodic `noChange` heartbeat entirely: every quiet tick is
    /// suppressed rather than sent empty.
    #[must_use]
    pub fn new(dirty_tracking: DirtyTrackingMode, heartbeat_every_ticks: u32) -> Self {
        Self {
            dirty_tracking,
            adaptive: AdaptiveState::new(),
            heartbeat_every_ticks,
            ticks_since_heartbeat: 0,
            players: BTreeMap::new(),
        }
    }

    /// Register a newly joined player; they receive a `firstSync` on the
    /// next tick regardless of the land-wide mode.
    pub fn register_player(&mut self, player: PlayerId) {
        self.players.insert(player, PlayerSyncState::new());
    }

    /// Forget a departed player's sync state.
    pub fn remove_player(&mut self, player: &PlayerId) {
        self.players.remove(player);
    }

    /// `true` if `player` is currently tracked by this engine.
    #[must_use]
    pub fn has_player(&self, player: &PlayerId) -> bool {
        self.players.contains_key(player)
    }

    /// Force a player back to `firstSync` on the next tick, e.g. after a
    /// confirmed client desync report.
    pub fn force_resync(&mut self, player: &PlayerId) {
        if let Some(state) = self.players.get_mut(player) {
            state.has_synced = false;
        }
    }

    /// Whether dirty tracking (and therefore incremental/dirty-snapshot-
    /// diff modes) is currently in effect.
    #[must_use]
    pub const fn dirty_tracking_effective(&self) -> bool {
        match self.dirty_tracking {
            DirtyTrackingMode::Enabled => true,
            DirtyTrackingMode::Disabled => false,
            DirtyTrackingMode::Adaptive(_) => self.adaptive.enabled(),
        }
    }

    /// Compute this tick's per-player [`StateUpdatePayload`]s.
    ///
    /// - `patches`: every [`ScopedPatch`] recorded this tick.
    /// - `coverage_ok`: `true` if every broadcast/per-player-dirty field
    ///   was covered by at least one patch in `patches` (the caller — the
    ///   Land Keeper — computes this from its concrete state tree's
    ///   dirty bits, which `land-sync` cannot see generically).
    /// - `dirty_roots`: absolute paths of containers reported dirty this
    ///   tick, used to scope dirty-snapshot-diff's subtree rebuild.
    /// - `full_snapshot`: the Land's complete, unfiltered snapshot as of
    ///   this tick.
    /// - `table`: the Land type's field-policy table (see
    ///   [`crate::visibility`]).
    ///
    /// Returns only the players that should receive a frame this tick —
    /// a suppressed `noChange` yields no entry at all.
    pub fn tick(
        &mut self,
        patches: &[ScopedPatch],
        coverage_ok: bool,
        dirty_roots: &[String],
        full_snapshot: &SnapshotValue,
        table: &FieldPolicyTable,
    ) -> BTreeMap<PlayerId, StateUpdatePayload> {
        let dirty_tracking_enabled = self.dirty_tracking_effective();
        let any_dirty = !patches.is_empty() || !dirty_roots.is_empty();
        let land_mode = Self::select_mode(any_dirty, dirty_tracking_enabled, coverage_ok, dirty_roots);

        self.ticks_since_heartbeat += 1;
        let heartbeat_due = self.heartbeat_every_ticks > 0 && self.ticks_since_heartbeat >= self.heartbeat_every_ticks;

        let mut incremental_bytes_total = 0_usize;
        let mut snapshot_bytes_total = 0_usize;
        let mut out = BTreeMap::new();

        let player_ids: Vec<PlayerId> = self.players.keys().cloned().collect();
        for player in player_ids {
            let Some(state) = self.players.get_mut(&player) else {
                continue;
            };

            if !state.has_synced {
                let visible = crate::visibility::filter_snapshot_for_player(full_snapshot, table, Some(player.as_str()));
                state.has_synced = true;
                state.last_visible_snapshot = visible.clone();
                out.insert(
                    player,
                    StateUpdatePayload {
                        kind: UpdateKind::FirstSync,
                        patches: Vec::new(),
                        snapshot: Some(visible),
                    },
                );
                continue;
            }

            let Some(mode) = land_mode else {
                if heartbeat_due {
                    out.insert(player, Self::no_change());
                }
                continue;
            };

            let incremental_patches: Vec<Patch> = patches
                .iter()
                .filter(|sp| scope_visible(&sp.scope, &player))
                .map(|sp| sp.patch.clone())
                .collect();
            let incremental_bytes = estimate_patch_bytes(&incremental_patches);

            let visible_new = crate::visibility::filter_snapshot_for_player(full_snapshot, table, Some(player.as_str()));

            let snapshot_patches = match mode {
                SyncMode::Incremental => Vec::new(),
                SyncMode::DirtySnapshotDiff => dirty_roots
                    .iter()
                    .flat_map(|root| {
                        let old_sub = subtree_at(&state.last_visible_snapshot, root).cloned().unwrap_or(SnapshotValue::Null);
                        let new_sub = subtree_at(&visible_new, root).cloned().unwrap_or(SnapshotValue::Null);
                        diff_snapshot(root, &old_sub, &new_sub)
                    })
                    .collect(),
                SyncMode::FullDiff => diff_snapshot("", &state.last_visible_snapshot, &visible_new),
            };

            if matches!(self.dirty_tracking, DirtyTrackingMode::Adaptive(_)) && coverage_ok && !dirty_roots.is_empty() {
                let shadow_snapshot_patches: Vec<Patch> = dirty_roots
                    .iter()
                    .flat_map(|root| {
                        let old_sub = subtree_at(&state.last_visible_snapshot, root).cloned().unwrap_or(SnapshotValue::Null);
                        let new_sub = subtree_at(&visible_new, root).cloned().unwrap_or(SnapshotValue::Null);
                        diff_snapshot(root, &old_sub, &new_sub)
                    })
                    .collect();
                incremental_bytes_total += incremental_bytes;
                snapshot_bytes_total += estimate_patch_bytes(&shadow_snapshot_patches);
            }

            state.last_visible_snapshot = visible_new;

            let payload_patches = match mode {
                SyncMode::Incremental => incremental_patches,
                SyncMode::DirtySnapshotDiff | SyncMode::FullDiff => snapshot_patches,
            };

            if payload_patches.is_empty() {
                if heartbeat_due {
                    out.insert(player, Self::no_change());
                }
            } else {
                out.insert(
                    player,
                    StateUpdatePayload {
                        kind: UpdateKind::Diff,
                        patches: payload_patches,
                        snapshot: None,
                    },
                );
            }
        }

        if heartbeat_due {
            self.ticks_since_heartbeat = 0;
        }

        if let DirtyTrackingMode::Adaptive(cfg) = self.dirty_tracking {
            if incremental_bytes_total > 0 || snapshot_bytes_total > 0 {
                self.adaptive.observe(incremental_bytes_total, snapshot_bytes_total, cfg);
            }
        }

        out
    }

    fn select_mode(any_dirty: bool, dirty_tracking_enabled: bool, coverage_ok: bool, dirty_roots: &[String]) -> Option<SyncMode> {
        if !any_dirty {
            return None;
        }
        if !dirty_tracking_enabled {
            return Some(SyncMode::FullDiff);
        }
        if coverage_ok {
            return Some(SyncMode::Incremental);
        }
        if dirty_roots.is_empty() {
            Some(SyncMode::FullDiff)
        } else {
            Some(SyncMode::DirtySnapshotDiff)
        }
    }

    fn no_change() -> StateUpdatePayload {
        StateUpdatePayload {
            kind: UpdateKind::NoChange,
            patches: Vec::new(),
            snapshot: None,
        }
    }
}

fn scope_visible(scope: &PatchScope, player: &PlayerId) -> bool {
    match scope {
        PatchScope::Broadcast => true,
        PatchScope::PerPlayer(key) => key.as_str() == player.as_str(),
        PatchScope::Internal => false,
    }
}

fn estimate_patch_bytes(patches: &[Patch]) -> usize {
    serde_json::to_string(patches).map(|s| s.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_state::{StateSchema, SyncPolicy};
    use land_wire::PatchOp;

    fn table() -> FieldPolicyTable {
        let schema = StateSchema::new()
            .field("/count", SyncPolicy::Broadcast)
            .field("/players", SyncPolicy::PerPlayer);
        FieldPolicyTable::from_schema(&schema)
    }

    #[test]
    fn new_player_always_gets_first_sync_snapshot() {
        let mut engine = SyncEngine::new(DirtyTrackingMode::Enabled, 0);
        let p1 = PlayerId::new("p1");
        engine.register_player(p1.clone());
        let full = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        let out = engine.tick(&[], true, &[], &full, &table());
        let update = out.get(&p1).expect("p1 update");
        assert_eq!(update.kind, UpdateKind::FirstSync);
        assert_eq!(update.snapshot, Some(full));
    }

    #[test]
    fn coverage_ok_uses_incremental_patches_scoped_to_player() {
        let mut engine = SyncEngine::new(DirtyTrackingMode::Enabled, 0);
        let p1 = PlayerId::new("p1");
        let p2 = PlayerId::new("p2");
        engine.register_player(p1.clone());
        engine.register_player(p2.clone());
        let full = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        engine.tick(&[], true, &[], &full, &table());

        let patches = vec![ScopedPatch {
            patch: Patch {
                path: "/players/p1/score".to_string(),
                op: PatchOp::Set,
                value: Some(SnapshotValue::Int(10)),
            },
            scope: PatchScope::PerPlayer("p1".to_string()),
        }];
        let full2 = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        let out = engine.tick(&patches, true, &["/players".to_string()], &full2, &table());
        let p1_update = out.get(&p1).expect("p1 update");
        assert_eq!(p1_update.kind, UpdateKind::Diff);
        assert_eq!(p1_update.patches.len(), 1);
        assert!(!out.contains_key(&p2), "p2 should get no frame (noChange suppressed)");
    }

    #[test]
    fn dirty_tracking_disabled_falls_back_to_full_diff() {
        let mut engine = SyncEngine::new(DirtyTrackingMode::Disabled, 0);
        let p1 = PlayerId::new("p1");
        engine.register_player(p1.clone());
        let full1 = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        engine.tick(&[], true, &[], &full1, &table());

        let full2 = SnapshotValue::map([("count", SnapshotValue::Int(5))]);
        let patches = vec![ScopedPatch {
            patch: Patch {
                path: "/count".to_string(),
                op: PatchOp::Set,
                value: Some(SnapshotValue::Int(5)),
            },
            scope: PatchScope::Broadcast,
        }];
        let out = engine.tick(&patches, true, &[], &full2, &table());
        let update = out.get(&p1).expect("p1 update");
        assert_eq!(update.kind, UpdateKind::Diff);
        assert_eq!(update.patches[0].path, "/count");
    }

    #[test]
    fn force_resync_triggers_first_sync_again() {
        let mut engine = SyncEngine::new(DirtyTrackingMode::Enabled, 0);
        let p1 = PlayerId::new("p1");
        engine.register_player(p1.clone());
        let full = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        engine.tick(&[], true, &[], &full, &table());
        engine.force_resync(&p1);
        let out = engine.tick(&[], true, &[], &full, &table());
        assert_eq!(out.get(&p1).expect("update").kind, UpdateKind::FirstSync);
    }

    #[test]
    fn heartbeat_cadence_emits_no_change_when_due() {
        let mut engine = SyncEngine::new(DirtyTrackingMode::Enabled, 2);
        let p1 = PlayerId::new("p1");
        engine.register_player(p1.clone());
        let full = SnapshotValue::map([("count", SnapshotValue::Int(0))]);
        engine.tick(&[], true, &[], &full, &table()); // first sync, tick 1
        let out = engine.tick(&[], true, &[], &full, &table()); // tick 2: no dirty, heartbeat not yet due (count=2>=2 due)
        assert_eq!(out.get(&p1).expect("heartbeat").kind, UpdateKind::NoChange);
    }
}

// SPDX-License-Identifier: Apache-2.0
//! Per-player visibility filtering of a full state snapshot.
//!
//! `land-state`'s containers record each patch's scope as it happens, but
//! a *snapshot* (used for `firstSync`/full-diff/dirty-snapshot-diff) has
//! no per-value scope tag of its own — it is just a `SnapshotValue` tree.
//! To filter one for a given player without per-Land generated code, the
//! Sync Engine does a runtime reflection scan once at Land-registration
//! time, as an alternative to build-time codegen:
//! `land_state::StateSchema` declares each static
//! field path's [`land_state::SyncPolicy`] once, and [`FieldPolicyTable`]
//! turns that into a longest-prefix-match lookup used to prune the
//! snapshot tree at filter time.

use std::collections::BTreeMap;

use land_state::{StateSchema, SyncPolicy};
use land_wire::SnapshotValue;

/// A longest-prefix-match table from declared absolute path to
/// [`SyncPolicy`], built once per Land type at registration time.
#[derive(Debug, Clone, Default)]
pub struct FieldPolicyTable {
    // Sorted by path so prefix search can walk from the longest candidate
    // down; built once, read every tick.
    entries: Vec<(String, SyncPolicy)>,
}

impl FieldPolicyTable {
    /// Build a table from a Land type's declared schema.
    #[must_use]
    pub fn from_schema(schema: &StateSchema) -> Self {
        let mut entries: Vec<(String, SyncPolicy)> = schema
            .fields()
            .iter()
            .map(|f| (f.path.clone(), f.policy))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    /// The policy in effect for `path`: the declared policy of the
    /// longest declared prefix of `path`, or [`SyncPolicy::Broadcast`] if
    /// no declared field covers it (an undeclared path is assumed
    /// globally visible, matching `land-state`'s own default of treating
    /// a container's policy as `Broadcast` unless a narrower one is
    /// given).
    #[must_use]
    pub fn policy_for(&self, path: &str) -> SyncPolicy {
        self.entries
            .iter()
            .find(|(prefix, _)| path == prefix || path.starts_with(&format!("{prefix}/")))
            .map_or(SyncPolicy::Broadcast, |(_, policy)| *policy)
    }
}

/// Filter `full` down to what `player` (or nobody, for a spectator/
/// broadcast-only render) is allowed to see, per `table`.
///
/// At a path whose policy is `Internal`, the whole subtree is dropped. At
/// a path whose policy is `PerPlayer`, the node must be a map keyed by
/// player id; the result keeps that same key structure but with only the
/// entry matching `player` present (an empty map, if `player` is `None`
/// or absent from the map) — the `/players` node stays a map, it never
/// collapses to the bare entry value. Once inside that surviving entry,
/// `PerPlayer` is not re-applied to its own subtree (the entry is not
/// itself a second map keyed by player id); it recurses as a plain
/// container from there on, same as `Broadcast`. Every other path
/// recurses unfiltered, applying the same rule again at each descendant
/// path.
#[must_use]
pub fn filter_snapshot_for_player(full: &SnapshotValue, table: &FieldPolicyTable, player: Option<&str>) -> SnapshotValue {
    filter_at("", full, table, player, false)
}

fn filter_at(path: &str, value: &SnapshotValue, table: &FieldPolicyTable, player: Option<&str>, in_player_scope: bool) -> SnapshotValue {
    match table.policy_for(path) {
        SyncPolicy::Internal => SnapshotValue::Null,
        SyncPolicy::PerPlayer if !in_player_scope => {
            let SnapshotValue::Map(map) = value else {
                return SnapshotValue::Null;
            };
            let Some(id) = player else {
                return SnapshotValue::Null;
            };
            map.get(id).map_or(SnapshotValue::Null, |entry| {
                let child_path = land_wire::join_path(path, id);
                let filtered_entry = filter_at(&child_path, entry, table, player, true);
                let mut out = BTreeMap::new();
                out.insert(id.to_string(), filtered_entry);
                SnapshotValue::Map(out)
            })
        }
        SyncPolicy::PerPlayer | SyncPolicy::Broadcast => match value {
            SnapshotValue::Map(map) => {
                let mut out = BTreeMap::new();
                for (key, child) in map {
                    let child_path = land_wire::join_path(path, key);
                    let filtered = filter_at(&child_path, child, table, player, in_player_scope);
                    if !filtered.is_null() {
                        out.insert(key.clone(), filtered);
                    }
                }
                SnapshotValue::Map(out)
            }
            other => other.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> StateSchema {
        StateSchema::new()
            .field("/count", SyncPolicy::Broadcast)
            .field("/secretSeed", SyncPolicy::Internal)
            .field("/players", SyncPolicy::PerPlayer)
    }

    #[test]
    fn broadcast_field_is_visible_to_everyone() {
        let table = FieldPolicyTable::from_schema(&schema());
        let full = SnapshotValue::map([("count", SnapshotValue::Int(3))]);
        let filtered = filter_snapshot_for_player(&full, &table, None);
        assert_eq!(filtered, full);
    }

    #[test]
    fn internal_field_is_dropped_for_everyone() {
        let table = FieldPolicyTable::from_schema(&schema());
        let full = SnapshotValue::map([
            ("count", SnapshotValue::Int(3)),
            ("secretSeed", SnapshotValue::Int(42)),
        ]);
        let filtered = filter_snapshot_for_player(&full, &table, Some("p1"));
        let SnapshotValue::Map(m) = filtered else {
            panic!("expected map");
        };
        assert!(!m.contains_key("secretSeed"));
        assert!(m.contains_key("count"));
    }

    #[test]
    fn per_player_field_shows_only_requesting_players_entry() {
        let table = FieldPolicyTable::from_schema(&schema());
        let full = SnapshotValue::map([(
            "players",
            SnapshotValue::map([
                ("p1", SnapshotValue::Int(10)),
                ("p2", SnapshotValue::Int(20)),
            ]),
        )]);
        let filtered = filter_snapshot_for_player(&full, &table, Some("p1"));
        let SnapshotValue::Map(m) = filtered else {
            panic!("expected map");
        };
        let SnapshotValue::Map(players) = &m["players"] else {
            panic!("expected nested map");
        };
        assert_eq!(players.len(), 1);
        assert_eq!(players.get("p1"), Some(&SnapshotValue::Int(10)));
        assert!(!players.contains_key("p2"));
    }

    #[test]
    fn per_player_field_is_empty_with_no_player_given() {
        let table = FieldPolicyTable::from_schema(&schema());
        let full = SnapshotValue::map([("players", SnapshotValue::map([("p1", SnapshotValue::Int(10))]))]);
        let filtered = filter_snapshot_for_player(&full, &table, None);
        let SnapshotValue::Map(m) = filtered else {
            panic!("expected map");
        };
        assert!(!m.contains_key("players"));
    }
}

// SPDX-License-Identifier: Apache-2.0
//! A reactive map keyed by string, tracking per-key insert/update/remove
//! dirtiness independent of patch recording.

use std::cell::RefCell;
use std::collections::BTreeMap;

use land_wire::{PatchOp, SnapshotValue};

use crate::{Cursor, Snapshot, SyncPolicy};

/// What happened to a key since the last [`ReactiveMap::clear_dirty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    /// The key did not exist before and now does.
    Inserted,
    /// The key existed and its value changed.
    Updated,
    /// The key existed and was removed (the value itself is gone).
    Removed,
}

/// A reactive `String`-keyed map. Ordered (`BTreeMap`) so snapshot and
/// canonical encoding need no separate sort pass, and so iteration order
/// is stable across a dirty-snapshot-diff rebuild.
#[derive(Debug)]
pub struct ReactiveMap<V> {
    entries: BTreeMap<String, V>,
    dirty: RefCell<BTreeMap<String, DirtyKind>>,
    policy: SyncPolicy,
}

impl<V> ReactiveMap<V> {
    /// Create an empty map with the declared visibility its entries
    /// inherit by containment.
    #[must_use]
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            dirty: RefCell::new(BTreeMap::new()),
            policy,
        }
    }

    /// The map's declared visibility.
    #[must_use]
    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Look up a value by key.
    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Mutate an existing entry's own nested fields in place, without
    /// replacing the entry itself. The caller drives its own patch
    /// recording through `cursor`'s `entry_cursor` (e.g. a nested
    /// `Field::set`) — this does not itself mark the key dirty in
    /// [`Self::dirty_keys`] since it records no container-level patch of
    /// its own — it is a "mutate-in-place" operation where the caller's
    /// own field-level patch is what the Sync Engine actually sees.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &V)> {
        self.entries.iter()
    }

    /// The number of entries currently in the map.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `true` if any key has been inserted, updated, or removed since the
    /// last [`Self::clear_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    /// The set of keys that changed since the last [`Self::clear_dirty`],
    /// and how.
    #[must_use]
    pub fn dirty_keys(&self) -> BTreeMap<String, DirtyKind> {
        self.dirty.borrow().clone()
    }

    /// Reset dirty tracking. Called by the Sync Engine once a tick's
    /// output has been consumed.
    pub fn clear_dirty(&self) {
        self.dirty.borrow_mut().clear();
    }

    /// Derive the per-entry cursor for `key`, applying this map's policy
    /// under containment (see [`Cursor::child_scoped`]).
    #[must_use]
    pub fn entry_cursor(&self, cursor: &Cursor, segment: &str, key: &str) -> Cursor {
        cursor.child_scoped(segment, key, self.policy)
    }
}

impl<V: ToOwnedSnapshot> ReactiveMap<V> {
    /// Insert or replace the value at `key`, recording an `add` patch for
    /// a new key or a `set` patch for an existing one.
    pub fn set(&mut self, cursor: &Cursor, segment: &str, key: &str, value: V) {
        let entry_cursor = self.entry_cursor(cursor, segment, key);
        let op = if self.entries.contains_key(key) {
            self.dirty
                .borrow_mut()
                .insert(key.to_string(), DirtyKind::Updated);
            PatchOp::Set
        } else {
            self.dirty
                .borrow_mut()
                .insert(key.to_string(), DirtyKind::Inserted);
            PatchOp::Add
        };
        let snapshot = value.to_owned_snapshot();
        self.entries.insert(key.to_string(), value);
        entry_cursor.record_here(self.policy, op, Some(snapshot));
    }

    /// Remove a key, recording a `delete` patch if it was present.
    pub fn remove(&mut self, cursor: &Cursor, segment: &str, key: &str) -> Option<V> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty
                .borrow_mut()
                .insert(key.to_string(), DirtyKind::Removed);
            let entry_cursor = self.entry_cursor(cursor, segment, key);
            entry_cursor.record_here(self.policy, PatchOp::Delete, None);
        }
        removed
    }
}

/// A narrower conversion than [`land_wire::ToSnapshotValue`] for owned map
/// values: covers both leaf-like `V: ToSnapshotValue` and `V: Snapshot`
/// container entries (a `ReactiveMap<PlayerState>` where `PlayerState` is
/// itself a composed struct) with one blanket path each.
pub trait ToOwnedSnapshot {
    /// Render the value as a snapshot, by reference.
    fn to_owned_snapshot(&self) -> SnapshotValue;
}

impl<T: Snapshot> ToOwnedSnapshot for T {
    fn to_owned_snapshot(&self) -> SnapshotValue {
        self.to_snapshot()
    }
}

impl<V: Snapshot> Snapshot for ReactiveMap<V> {
    fn to_snapshot(&self) -> SnapshotValue {
        SnapshotValue::map(self.entries.iter().map(|(k, v)| (k.clone(), v.to_snapshot())))
    }
}

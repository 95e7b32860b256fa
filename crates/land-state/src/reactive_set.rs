// SPDX-License-Identifier: Apache-2.0
//! A reactive set of strings, tracking insert/remove dirtiness.

use std::cell::RefCell;
use std::collections::BTreeSet;

use land_wire::{PatchOp, SnapshotValue};

use crate::{Cursor, Snapshot, SyncPolicy};

/// What happened to a member since the last [`ReactiveSet::clear_dirty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyKind {
    /// Newly present.
    Inserted,
    /// No longer present.
    Removed,
}

/// A reactive set of string members (e.g. "players currently spectating",
/// "tiles revealed"), ordered for deterministic snapshot encoding.
#[derive(Debug)]
pub struct ReactiveSet {
    members: BTreeSet<String>,
    dirty: RefCell<BTreeSet<(String, DirtyKind)>>,
    policy: SyncPolicy,
}

impl ReactiveSet {
    /// Create an empty set with the declared visibility its members
    /// inherit by containment.
    #[must_use]
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            members: BTreeSet::new(),
            dirty: RefCell::new(BTreeSet::new()),
            policy,
        }
    }

    /// The set's declared visibility.
    #[must_use]
    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// `true` if `member` is currently present.
    #[must_use]
    pub fn contains(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    /// Iterate over members in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.members.iter()
    }

    /// The number of members currently present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Insert a member, recording an `add` patch if it was not already
    /// present. A no-op otherwise (inserting an existing member is not
    /// dirty: sets have no per-member value to update).
    pub fn insert(&mut self, cursor: &Cursor, segment: &str, member: &str) {
        if self.members.insert(member.to_string()) {
            self.dirty
                .borrow_mut()
                .insert((member.to_string(), DirtyKind::Inserted));
            let entry_cursor = cursor.child_scoped(segment, member, self.policy);
            entry_cursor.record_here(
                self.policy,
                PatchOp::Add,
                Some(SnapshotValue::Str(member.to_string())),
            );
        }
    }

    /// Remove a member, recording a `delete` patch if it was present.
    pub fn remove(&mut self, cursor: &Cursor, segment: &str, member: &str) {
        if self.members.remove(member) {
            self.dirty
                .borrow_mut()
                .insert((member.to_string(), DirtyKind::Removed));
            let entry_cursor = cursor.child_scoped(segment, member, self.policy);
            entry_cursor.record_here(self.policy, PatchOp::Delete, None);
        }
    }

    /// `true` if any member changed since the last [`Self::clear_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.borrow().is_empty()
    }

    /// Reset dirty tracking.
    pub fn clear_dirty(&self) {
        self.dirty.borrow_mut().clear();
    }
}

impl Snapshot for ReactiveSet {
    fn to_snapshot(&self) -> SnapshotValue {
        SnapshotValue::Array(self.members.iter().map(|m| SnapshotValue::Str(m.clone())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn insert_is_idempotent_and_dirty_once() {
        let recorder = Rc::new(crate::PatchRecorder::new());
        let cursor = Cursor::recording(&recorder);
        let mut set = ReactiveSet::new(SyncPolicy::Broadcast);
        set.insert(&cursor, "revealed", "tile-3");
        set.insert(&cursor, "revealed", "tile-3");
        assert_eq!(recorder.drain().len(), 1);
        assert!(set.contains("tile-3"));
    }

    #[test]
    fn remove_absent_member_is_not_dirty() {
        let recorder = Rc::new(crate::PatchRecorder::new());
        let cursor = Cursor::recording(&recorder);
        let mut set = ReactiveSet::new(SyncPolicy::Broadcast);
        set.remove(&cursor, "revealed", "tile-3");
        assert!(recorder.drain().is_empty());
        assert!(!set.is_dirty());
    }
}

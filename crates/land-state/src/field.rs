// SPDX-License-Identifier: Apache-2.0
//! A single reactive leaf value.

use std::cell::Cell;

use land_wire::{PatchOp, ToSnapshotValue};

use crate::{Cursor, Snapshot, SyncPolicy};

/// A reactive leaf field: a value, its declared visibility, and a dirty
/// bit that survives patch recording (dirty bits are cleared only when
/// the Sync Engine consumes the tick's output, not merely because a patch
/// was recorded).
#[derive(Debug, Clone)]
pub struct Field<T> {
    value: T,
    policy: SyncPolicy,
    dirty: Cell<bool>,
}

impl<T> Field<T> {
    /// Create a field with an initial value and declared visibility.
    /// Construction itself is never recorded as a patch — only
    /// [`Field::set`] is.
    pub const fn new(value: T, policy: SyncPolicy) -> Self {
        Self {
            value,
            policy,
            dirty: Cell::new(false),
        }
    }

    /// The current value.
    pub const fn get(&self) -> &T {
        &self.value
    }

    /// The field's declared visibility.
    #[must_use]
    pub const fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// `true` if the value has changed since the last [`Self::clear_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Reset the dirty bit. Called by the Sync Engine once a tick's output
    /// has been produced, not by the container itself.
    pub fn clear_dirty(&self) {
        self.dirty.set(false);
    }
}

impl<T: Clone + PartialEq + ToSnapshotValue> Field<T> {
    /// Replace the value, marking the field dirty and — if `cursor` has a
    /// recorder attached — appending a `set` patch at `cursor`'s path
    /// joined with `segment`. A no-op write (new value equals the old one)
    /// still marks the field dirty: the caller asked to set it, and
    /// suppressing identical writes would require `Eq`-comparing every
    /// leaf type unconditionally, which the Sync Engine's own
    /// dirty-snapshot-diff fallback already does when it matters more than
    /// here.
    pub fn set(&mut self, cursor: &Cursor, segment: &str, value: T) {
        self.value = value;
        self.dirty.set(true);
        cursor.record(
            segment,
            self.policy,
            PatchOp::Set,
            Some(self.value.to_snapshot_value()),
        );
    }
}

impl<T: ToSnapshotValue> Snapshot for Field<T> {
    fn to_snapshot(&self) -> land_wire::SnapshotValue {
        self.value.to_snapshot_value()
    }
}

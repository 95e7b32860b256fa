// SPDX-License-Identifier: Apache-2.0
//! The per-tick patch recorder and the cursor containers use to find their
//! absolute path and ambient visibility scope without storing a parent
//! pointer.

use land_wire::{Patch, PatchOp};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::SyncPolicy;

/// The scope a recorded patch was produced under, derived from containment
/// rather than from the mutated field's own declared [`SyncPolicy`] alone:
/// once an ancestor map fixes `PerPlayer(key)` or `Internal`, every
/// descendant inherits that scope regardless of its own annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchScope {
    /// Send to every connected player.
    Broadcast,
    /// Send only to the named player.
    PerPlayer(String),
    /// Never leaves the Land Keeper.
    Internal,
}

/// A [`Patch`] tagged with the scope it was recorded under. `land-sync`
/// uses the scope to filter the broadcast/per-player/internal fan-out
/// without re-deriving containment from the path string.
#[derive(Debug, Clone)]
pub struct ScopedPatch {
    /// The wire-level patch (path, op, value).
    pub patch: Patch,
    /// The visibility this patch was recorded under.
    pub scope: PatchScope,
}

/// A per-tick scratch buffer of recorded patches.
///
/// Created fresh at tick start, drained by the Sync Engine at sync time,
/// and dropped (not reused) once the tick's output has been consumed, a
/// per-request scratch buffer rather than a long-lived shared log.
/// Single-writer: the Land Keeper never hands a
/// container view across an `.await` that could alias this `RefCell`.
#[derive(Debug, Default)]
pub struct PatchRecorder {
    patches: RefCell<Vec<ScopedPatch>>,
}

impl PatchRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a recorded patch.
    pub fn record(&self, patch: Patch, scope: PatchScope) {
        self.patches.borrow_mut().push(ScopedPatch { patch, scope });
    }

    /// Drain every patch recorded so far, leaving the recorder empty.
    pub fn drain(&self) -> Vec<ScopedPatch> {
        self.patches.borrow_mut().drain(..).collect()
    }

    /// `true` if nothing has been recorded since the last drain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.borrow().is_empty()
    }
}

/// A position in the state tree: an absolute path and the ambient
/// visibility scope inherited from ancestors. Containers clone-and-inject
/// a derived cursor into every child view they hand out; none of them
/// stores a cursor pointing back to a parent.
#[derive(Debug, Clone)]
pub struct Cursor {
    path: Rc<str>,
    scope: PatchScope,
    recorder: Option<Weak<PatchRecorder>>,
}

impl Cursor {
    /// The root cursor: empty path, broadcast scope, no recorder attached.
    /// Used to build state outside of a tick (e.g. initial construction),
    /// where mutations must not be recorded as patches.
    #[must_use]
    pub fn root() -> Self {
        Self {
            path: Rc::from(""),
            scope: PatchScope::Broadcast,
            recorder: None,
        }
    }

    /// A root cursor with a recorder attached, used at tick start.
    #[must_use]
    pub fn recording(recorder: &Rc<PatchRecorder>) -> Self {
        Self {
            path: Rc::from(""),
            scope: PatchScope::Broadcast,
            recorder: Some(Rc::downgrade(recorder)),
        }
    }

    /// The absolute path this cursor points at.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The ambient scope inherited from ancestors.
    #[must_use]
    pub fn scope(&self) -> &PatchScope {
        &self.scope
    }

    /// Derive a child cursor for `segment`, inheriting the ambient scope
    /// unchanged. Used for plain struct-to-struct composition, where the
    /// child container carries no `SyncPolicy` of its own.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        Self {
            path: Rc::from(land_wire::join_path(&self.path, segment).as_str()),
            scope: self.scope.clone(),
            recorder: self.recorder.clone(),
        }
    }

    /// Derive a child cursor for a map entry keyed by `key`, applying
    /// `policy` under containment: an ancestor's `PerPlayer`/`Internal`
    /// scope always wins over a map's own declared policy, since a
    /// narrower scope can never be widened by a descendant.
    #[must_use]
    pub fn child_scoped(&self, segment: &str, key: &str, policy: SyncPolicy) -> Self {
        let scope = match &self.scope {
            PatchScope::Internal => PatchScope::Internal,
            PatchScope::PerPlayer(existing) => PatchScope::PerPlayer(existing.clone()),
            PatchScope::Broadcast => match policy {
                SyncPolicy::Broadcast => PatchScope::Broadcast,
                SyncPolicy::PerPlayer => PatchScope::PerPlayer(key.to_string()),
                SyncPolicy::Internal => PatchScope::Internal,
            },
        };
        Self {
            path: Rc::from(land_wire::join_path(&self.path, segment).as_str()),
            scope,
            recorder: self.recorder.clone(),
        }
    }

    /// Resolve the effective scope for a leaf field's own declared
    /// `policy`, applying the same containment rule as
    /// [`Self::child_scoped`]. A field declaring `PerPlayer` with no
    /// enclosing per-player map has no player key to attach, so it fails
    /// safe to `Internal` (never sent) rather than guessing a recipient or
    /// broadcasting a value meant to be scoped.
    fn effective_scope(&self, policy: SyncPolicy) -> PatchScope {
        match &self.scope {
            PatchScope::Internal => PatchScope::Internal,
            PatchScope::PerPlayer(existing) => PatchScope::PerPlayer(existing.clone()),
            PatchScope::Broadcast => match policy {
                SyncPolicy::Broadcast => PatchScope::Broadcast,
                SyncPolicy::Internal => PatchScope::Internal,
                SyncPolicy::PerPlayer => {
                    tracing::warn!(
                        "field declared PerPlayer with no enclosing per-player map; \
                         treating as Internal"
                    );
                    PatchScope::Internal
                }
            },
        }
    }

    /// Record a patch for `segment` under this cursor, if a recorder is
    /// attached. A dead `Weak` (recorder already dropped) is treated the
    /// same as no recorder: silently skipped, never a panic.
    pub fn record(&self, segment: &str, policy: SyncPolicy, op: PatchOp, value: Option<land_wire::SnapshotValue>) {
        let path = land_wire::join_path(&self.path, segment);
        self.record_at(path, policy, op, value);
    }

    /// Record a patch at this cursor's own path (no child segment
    /// appended), used by map/set entries whose cursor is already the
    /// per-key view.
    pub fn record_here(&self, policy: SyncPolicy, op: PatchOp, value: Option<land_wire::SnapshotValue>) {
        let path = self.path.to_string();
        self.record_at(path, policy, op, value);
    }

    fn record_at(&self, path: String, policy: SyncPolicy, op: PatchOp, value: Option<land_wire::SnapshotValue>) {
        let Some(weak) = &self.recorder else {
            return;
        };
        let Some(recorder) = weak.upgrade() else {
            return;
        };
        let scope = self.effective_scope(policy);
        recorder.record(Patch { path, op, value }, scope);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cursor_records_nothing() {
        let cursor = Cursor::root();
        cursor.record("count", SyncPolicy::Broadcast, PatchOp::Set, Some(land_wire::SnapshotValue::Int(1)));
        // no recorder attached; nothing to assert beyond "did not panic".
    }

    #[test]
    fn recording_cursor_captures_patches() {
        let recorder = Rc::new(PatchRecorder::new());
        let cursor = Cursor::recording(&recorder);
        cursor.record("count", SyncPolicy::Broadcast, PatchOp::Set, Some(land_wire::SnapshotValue::Int(1)));
        let drained = recorder.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].patch.path, "/count");
        assert_eq!(drained[0].scope, PatchScope::Broadcast);
    }

    #[test]
    fn per_player_map_forces_descendant_scope() {
        let recorder = Rc::new(PatchRecorder::new());
        let root = Cursor::recording(&recorder);
        let player_view = root.child_scoped("players", "p1", SyncPolicy::PerPlayer);
        let score_view = player_view.child("score");
        score_view.record("value", SyncPolicy::Broadcast, PatchOp::Set, Some(land_wire::SnapshotValue::Int(7)));
        let drained = recorder.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].scope, PatchScope::PerPlayer("p1".to_string()));
        assert_eq!(drained[0].patch.path, "/players/p1/score/value");
    }

    #[test]
    fn internal_ancestor_dominates_broadcast_field() {
        let recorder = Rc::new(PatchRecorder::new());
        let root = Cursor::recording(&recorder);
        let internal_view = root.child_scoped("secrets", "seed", SyncPolicy::Internal);
        internal_view.record("value", SyncPolicy::Broadcast, PatchOp::Set, Some(land_wire::SnapshotValue::Int(1)));
        let drained = recorder.drain();
        assert_eq!(drained[0].scope, PatchScope::Internal);
    }

    #[test]
    fn dropped_recorder_is_silently_ignored() {
        let recorder = Rc::new(PatchRecorder::new());
        let cursor = Cursor::recording(&recorder);
        drop(recorder);
        cursor.record("count", SyncPolicy::Broadcast, PatchOp::Set, None);
    }
}

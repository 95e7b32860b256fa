// SPDX-License-Identifier: Apache-2.0
//! Reactive state containers for Land Keeper state trees.
//!
//! A Land's state is a tree of [`Field`] leaves, [`ReactiveMap`]s, and
//! plain Rust structs composing them. Every mutation through these types
//! is recorded as an absolute-path [`land_wire::Patch`] (when a
//! [`PatchRecorder`] is attached) and marks the mutated path dirty, so the
//! Sync Engine (`land-sync`) can compute a per-tick diff without walking
//! the whole tree.

mod cursor;
mod field;
mod ids;
mod reactive_map;
mod reactive_set;
mod schema;

pub use cursor::{Cursor, PatchRecorder, PatchScope, ScopedPatch};
pub use field::Field;
pub use ids::{ClientId, LandId, PlayerId, PlayerSlot, PlayerSlotAllocator, SessionId, SessionIdAllocator};
pub use reactive_map::{DirtyKind as MapDirtyKind, ReactiveMap};
pub use reactive_set::{DirtyKind as SetDirtyKind, ReactiveSet};
pub use schema::{FieldMeta, StateSchema};

use land_wire::SnapshotValue;

/// Visibility of a field or container element, propagated by containment.
/// A `PerPlayer` map's children are
/// `PerPlayer` regardless of their own declared policy; an `Internal`
/// ancestor makes its entire subtree `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Visible to every connected player.
    Broadcast,
    /// Visible only to the player the enclosing map key names.
    PerPlayer,
    /// Never sent to any client; server-only bookkeeping.
    Internal,
}

/// A type whose current value can be rendered as a full [`SnapshotValue`]
/// subtree, independent of dirty tracking. Implemented by [`Field`],
/// [`ReactiveMap`], [`ReactiveSet`], and by every hand-written Land state
/// struct composing them.
pub trait Snapshot {
    /// Render the current value as a snapshot subtree.
    fn to_snapshot(&self) -> SnapshotValue;
}

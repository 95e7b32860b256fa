// SPDX-License-Identifier: Apache-2.0
//! The Sync Engine: turns one tick's recorded patches and current
//! snapshot into a per-player [`land_wire::StateUpdatePayload`], choosing
//! among three modes and filtering by visibility.

mod diff;
mod engine;
mod mode;
mod visibility;

pub use diff::{diff_snapshot, subtree_at};
pub use engine::SyncEngine;
pub use mode::{AdaptiveConfig, DirtyTrackingMode, SyncMode};
pub use visibility::{filter_snapshot_for_player, FieldPolicyTable};

// SPDX-License-Identifier: Apache-2.0
//! Reference `LandType` implementations: `counter`, a minimal broadcast
//! state Land, and `arena`, a per-player state Land. Neither is part of
//! the runtime; they exist to be registered with a `land-realm::Realm` by
//! `land-server` and exercised end-to-end by this workspace's
//! integration tests.

mod arena;
mod counter;

pub use arena::{ArenaLand, ArenaState, PlayerEntry};
pub use counter::{CounterLand, CounterState};

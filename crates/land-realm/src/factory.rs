// SPDX-License-Identifier: Apache-2.0
//! Per-`landType` registration: bundles the concrete `LandType`'s spawn
//! behavior behind a type-erased closure so [`crate::Realm`] can hold many
//! different `landType`s in one map. A definition factory, initial-state
//! factory, and Keeper configuration collapse here into "spawn a
//! `Keeper<L>`" plus the config and auto-create flag, since
//! `land-keeper`'s `LandType` trait already bundles the state/handler
//! templates.

use land_keeper::{KeeperConfig, KeeperHandle, KeeperOutput, LandType};
use land_state::LandId;
use tokio::sync::mpsc;

type SpawnFn = dyn Fn(LandId, KeeperConfig) -> (KeeperHandle, mpsc::UnboundedReceiver<KeeperOutput>)
    + Send
    + Sync;

/// A registered `landType`: how to spawn it, its default configuration,
/// and whether an unrecognized `LandID` of this type should be created on
/// first join.
pub struct RegisteredType {
    pub(crate) spawn: Box<SpawnFn>,
    pub(crate) config: KeeperConfig,
    pub(crate) allow_auto_create: bool,
}

impl RegisteredType {
    /// Register a concrete `LandType` implementation.
    #[must_use]
    pub fn new<L: LandType + 'static>(config: KeeperConfig, allow_auto_create: bool) -> Self {
        Self {
            spawn: Box::new(|land_id, config| land_keeper::spawn::<L>(land_id, config)),
            config,
            allow_auto_create,
        }
    }
}

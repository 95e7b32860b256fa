// SPDX-License-Identifier: Apache-2.0
//! The single-writer Land Keeper: per-Land command dispatch, resolver
//! pre-loading, handler execution, and the tick scheduler that drives
//! the Sync Engine.

mod command;
mod error;
mod handle;
mod handler;
mod keeper;
mod services;

pub use command::{
    ActionCommand, AdminCommand, ClientEventCommand, Command, JoinCommand, JoinOutcome,
    KeeperConfig, KeeperOutput, KeeperStats, LeaveCommand,
};
pub use error::{ActionError, HandlerError, JoinError, ResolverError};
pub use handle::KeeperHandle;
pub use handler::{
    HandlerCtx, HandlerDef, HandlerTable, LandType, ResolverCtx, ResolverDef, ResolverFuture,
    TargetSelector, TickCtx,
};
pub use keeper::{spawn, Keeper};
pub use services::{Clock, Rng, SeededRng, Services, SystemClock};

#[cfg(any(test, feature = "test-util"))]
pub use keeper::spawn_local;

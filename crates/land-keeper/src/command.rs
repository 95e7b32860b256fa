// SPDX-License-Identifier: Apache-2.0
//! The Keeper's command queue: everything that reaches a Land's state
//! flows through one of these, processed one at a time on the Keeper's
//! own loop.

use std::collections::BTreeMap;
use std::time::Duration;

use land_state::{ClientId, PlayerId, PlayerSlot, SessionId};
use land_sync::DirtyTrackingMode;
use land_wire::{ActionPayload, SnapshotValue, StateUpdatePayload};
use tokio::sync::oneshot;

use crate::error::{ActionError, JoinError};
use crate::handler::TargetSelector;

/// Result of a successful join, handed back to whoever submitted the
/// [`Command::Join`].
#[derive(Debug, Clone, Copy)]
pub struct JoinOutcome {
    /// The slot allocated to this player within the Land.
    pub slot: PlayerSlot,
}

/// A request to join this Land as `player`, carried over `session`/
/// `client`.
pub struct JoinCommand {
    /// The session the join request arrived on.
    pub session: SessionId,
    /// The connection that carried the join request.
    pub client: ClientId,
    /// The player identity requesting to join.
    pub player: PlayerId,
    /// Caller-supplied join metadata (`joinPayload.metadata`).
    pub metadata: Option<BTreeMap<String, SnapshotValue>>,
    /// Where the outcome is delivered.
    pub respond: oneshot::Sender<Result<JoinOutcome, JoinError>>,
}

/// A request for `player` to leave this Land.
pub struct LeaveCommand {
    /// The player identity leaving.
    pub player: PlayerId,
}

/// A typed action dispatched by `type_identifier` against the registered
/// action handler table.
pub struct ActionCommand {
    /// The session the action arrived on.
    pub session: SessionId,
    /// The connection that carried the action.
    pub client: ClientId,
    /// The player identity issuing the action.
    pub player: PlayerId,
    /// The action's wire payload.
    pub payload: ActionPayload,
    /// Where the handler's response (or error) is delivered.
    pub respond: oneshot::Sender<Result<SnapshotValue, ActionError>>,
}

/// A fire-and-forget client event dispatched against the registered
/// event handler table. At most one error frame may result; there is no
/// success response.
pub struct ClientEventCommand {
    /// The session the event arrived on.
    pub session: SessionId,
    /// The connection that carried the event.
    pub client: ClientId,
    /// The player identity that raised the event.
    pub player: PlayerId,
    /// The client event's type identifier.
    pub event_type: String,
    /// The event's wire payload.
    pub payload: SnapshotValue,
    /// Where a failure, if any, is delivered.
    pub respond: oneshot::Sender<Result<(), ActionError>>,
}

/// Point-in-time Keeper statistics, surfaced by `land-admin`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct KeeperStats {
    /// The Land this Keeper owns.
    pub land_id: String,
    /// Currently joined player count.
    pub player_count: usize,
    /// Ticks processed since this Keeper started.
    pub tick_count: u64,
}

/// Administrative requests that don't originate from a client session.
pub enum AdminCommand {
    /// Ask for current stats.
    Stats {
        /// Where the stats are delivered.
        respond: oneshot::Sender<KeeperStats>,
    },
    /// Ask for a full, unfiltered snapshot of the Land's current state,
    /// e.g. for `land-admin`'s reevaluation-record endpoint or a
    /// `land-replay` verifier comparing a replayed run's end state.
    Snapshot {
        /// Where the snapshot is delivered.
        respond: oneshot::Sender<SnapshotValue>,
    },
    /// Run one tick of the scheduled-tick path (the `on_tick` hook
    /// followed by a Sync Engine pass) immediately, regardless of the
    /// configured `tick_interval`. Used by `land-replay`'s verifier to
    /// drive a Keeper deterministically instead of on a wall-clock timer.
    ForceTick {
        /// Signalled once the tick has completed.
        respond: oneshot::Sender<()>,
    },
    /// Ask the Keeper to stop accepting new work and terminate after
    /// draining what is already queued.
    Shutdown {
        /// Signalled once the Keeper has stopped.
        respond: oneshot::Sender<()>,
    },
}

/// Everything that can be sent to a running Keeper.
pub enum Command {
    /// See [`JoinCommand`].
    Join(JoinCommand),
    /// See [`LeaveCommand`].
    Leave(LeaveCommand),
    /// See [`ActionCommand`].
    Action(ActionCommand),
    /// See [`ClientEventCommand`].
    ClientEvent(ClientEventCommand),
    /// See [`AdminCommand`].
    Admin(AdminCommand),
}

/// Output a running Keeper pushes to whoever is fanning out its traffic
/// (normally `land-transport`, via `land-realm`).
#[derive(Debug, Clone)]
pub enum KeeperOutput {
    /// A per-player state update frame, already visibility-filtered and
    /// mode-selected by the Sync Engine.
    StateUpdate {
        /// The player this update is addressed to.
        player: PlayerId,
        /// The update payload itself.
        payload: StateUpdatePayload,
    },
    /// A server-originated event, not yet resolved to concrete recipients.
    ServerEvent {
        /// Who should receive this event.
        target: TargetSelector,
        /// The event's type identifier.
        event_type: String,
        /// The event's payload.
        payload: SnapshotValue,
    },
    /// This Keeper has stopped running; no further output will arrive.
    Terminated,
}

/// Static configuration a Keeper is built with, narrowed from the
/// per-`LandType` `LandConfig` to what one Keeper instance needs.
#[derive(Debug, Clone)]
pub struct KeeperConfig {
    /// The period between scheduled ticks. `None` means this Land only
    /// syncs when a handler calls `request_sync_now`.
    pub tick_interval: Option<Duration>,
    /// How many ticks elapse, at most, between forced heartbeat syncs even
    /// with nothing dirty. Zero disables the heartbeat.
    pub sync_every_ticks: u32,
    /// How long this Land may sit with zero joined players before its
    /// Keeper terminates itself.
    pub idle_timeout: Duration,
    /// Maximum concurrently joined players; `None` is uncapped.
    pub max_players: Option<u32>,
    /// Incremental-diff coverage tracking mode for the Sync Engine.
    pub dirty_tracking: DirtyTrackingMode,
    /// Seed for this Keeper's injected [`crate::services::Services::live`]
    /// rng.
    pub rng_seed: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            tick_interval: Some(Duration::from_millis(50)),
            sync_every_ticks: 20,
            idle_timeout: Duration::from_secs(300),
            max_players: None,
            dirty_tracking: DirtyTrackingMode::Enabled,
            rng_seed: 0,
        }
    }
}

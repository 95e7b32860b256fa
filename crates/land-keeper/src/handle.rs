// SPDX-License-Identifier: Apache-2.0
//! `Send + Clone` handle other tasks use to talk to a running Keeper.

use std::collections::BTreeMap;

use land_state::{ClientId, LandId, PlayerId, SessionId};
use land_wire::{ActionPayload, SnapshotValue};
use tokio::sync::{mpsc, oneshot};

use crate::command::{
    ActionCommand, AdminCommand, ClientEventCommand, Command, JoinCommand, JoinOutcome,
    KeeperStats, LeaveCommand,
};
use crate::error::{ActionError, JoinError};

/// A cheaply cloneable, `Send` reference to a running Keeper. Holds only a
/// bounded [`mpsc::Sender`] of [`Command`]s — never the Land's state
/// itself, which stays on the Keeper's own thread.
#[derive(Clone)]
pub struct KeeperHandle {
    land_id: LandId,
    commands: mpsc::Sender<Command>,
}

impl KeeperHandle {
    pub(crate) fn new(land_id: LandId, commands: mpsc::Sender<Command>) -> Self {
        Self { land_id, commands }
    }

    /// The Land this handle addresses.
    #[must_use]
    pub fn land_id(&self) -> &LandId {
        &self.land_id
    }

    /// Join this Land as `player`.
    pub async fn join(
        &self,
        session: SessionId,
        client: ClientId,
        player: PlayerId,
        metadata: Option<BTreeMap<String, SnapshotValue>>,
    ) -> Result<JoinOutcome, JoinError> {
        let (respond, recv) = oneshot::channel();
        let cmd = Command::Join(JoinCommand {
            session,
            client,
            player,
            metadata,
            respond,
        });
        if self.commands.send(cmd).await.is_err() {
            return Err(JoinError::ShuttingDown);
        }
        recv.await.unwrap_or(Err(JoinError::ShuttingDown))
    }

    /// Leave this Land. Fire-and-forget: there is no meaningful failure
    /// mode from the caller's point of view other than the Keeper already
    /// being gone, which is indistinguishable from an ordinary leave.
    pub async fn leave(&self, player: PlayerId) {
        let _ = self
            .commands
            .send(Command::Leave(LeaveCommand { player }))
            .await;
    }

    /// Dispatch a typed action and await its response.
    pub async fn action(
        &self,
        session: SessionId,
        client: ClientId,
        player: PlayerId,
        payload: ActionPayload,
    ) -> Result<SnapshotValue, ActionError> {
        let (respond, recv) = oneshot::channel();
        let cmd = Command::Action(ActionCommand {
            session,
            client,
            player,
            payload,
            respond,
        });
        if self.commands.send(cmd).await.is_err() {
            return Err(ActionError::ShuttingDown);
        }
        recv.await.unwrap_or(Err(ActionError::ShuttingDown))
    }

    /// Dispatch a fire-and-forget client event; resolves once the Keeper
    /// has processed it, yielding an error only if the handler failed.
    pub async fn client_event(
        &self,
        session: SessionId,
        client: ClientId,
        player: PlayerId,
        event_type: impl Into<String>,
        payload: SnapshotValue,
    ) -> Result<(), ActionError> {
        let (respond, recv) = oneshot::channel();
        let cmd = Command::ClientEvent(ClientEventCommand {
            session,
            client,
            player,
            event_type: event_type.into(),
            payload,
            respond,
        });
        if self.commands.send(cmd).await.is_err() {
            return Err(ActionError::ShuttingDown);
        }
        recv.await.unwrap_or(Err(ActionError::ShuttingDown))
    }

    /// Fetch current Keeper statistics.
    pub async fn stats(&self) -> Option<KeeperStats> {
        let (respond, recv) = oneshot::channel();
        self.commands
            .send(Command::Admin(AdminCommand::Stats { respond }))
            .await
            .ok()?;
        recv.await.ok()
    }

    /// Fetch a full, unfiltered snapshot of the Land's current state.
    pub async fn snapshot(&self) -> Option<SnapshotValue> {
        let (respond, recv) = oneshot::channel();
        self.commands
            .send(Command::Admin(AdminCommand::Snapshot { respond }))
            .await
            .ok()?;
        recv.await.ok()
    }

    /// Force one scheduled-tick pass (the `on_tick` hook followed by a
    /// Sync Engine pass) to run immediately, regardless of the Keeper's
    /// configured `tick_interval`. Used by `land-replay` to drive a
    /// Keeper deterministically.
    pub async fn force_tick(&self) {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::Admin(AdminCommand::ForceTick { respond }))
            .await
            .is_ok()
        {
            let _ = recv.await;
        }
    }

    /// Ask the Keeper to stop. Resolves once it has actually terminated,
    /// or immediately if it was already gone.
    pub async fn shutdown(&self) {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::Admin(AdminCommand::Shutdown { respond }))
            .await
            .is_ok()
        {
            let _ = recv.await;
        }
    }
}

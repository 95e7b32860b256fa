// SPDX-License-Identifier: Apache-2.0
//! The registry port every session-routing backend implements.

use std::time::Duration;

use land_state::PlayerId;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::node::NodeId;

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No prior lease existed (or it had already expired); the claiming
    /// node now owns this player's session.
    Claimed,
    /// A live lease already existed on a different node, which has been
    /// notified to kick its local session; the claiming node now owns
    /// the lease.
    KickedPrevious {
        /// The node whose session was just invalidated.
        previous_node: NodeId,
    },
}

/// Errors a [`SessionRegistry`] operation may produce.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// `renew` was called for a lease this node no longer holds (it
    /// expired, or another node already claimed the player).
    #[error("lease not held by this node")]
    NotHeld,
}

/// Routes a [`PlayerId`] to the node currently hosting their live session,
/// across a multi-node deployment.
///
/// A single-node deployment has no need for this: every Land lives in the
/// same process, so there is nothing to route between.
pub trait SessionRegistry: Send + Sync {
    /// Claim `player`'s session for `node`, holding the lease for `ttl`.
    /// If another node already holds a live lease, it is kicked: a
    /// message is pushed to its inbox (see
    /// [`SessionRegistry::register_node`]) so its Transport Adapter can
    /// close the stale connection.
    fn claim(
        &self,
        player: PlayerId,
        node: NodeId,
        ttl: Duration,
    ) -> impl Future<Output = ClaimOutcome> + Send;

    /// Refresh `node`'s lease on `player` for another `ttl`. Fails if
    /// `node` does not currently hold the lease.
    fn renew(
        &self,
        player: &PlayerId,
        node: &NodeId,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Voluntarily release `node`'s lease on `player`, e.g. on graceful
    /// disconnect.
    fn release(&self, player: &PlayerId, node: &NodeId) -> impl Future<Output = ()> + Send;

    /// The node currently holding a live (non-expired) lease on `player`,
    /// if any.
    fn locate(&self, player: &PlayerId) -> impl Future<Output = Option<NodeId>> + Send;

    /// Register `node`'s kick inbox. A later `claim` for a player already
    /// leased to `node` pushes that player's id here; `node`'s Transport
    /// Adapter should close the matching local session.
    fn register_node(&self, node: NodeId) -> impl Future<Output = mpsc::UnboundedReceiver<PlayerId>> + Send;
}

// SPDX-License-Identifier: Apache-2.0
//! In-memory [`SessionRegistry`] reference implementation: a single
//! process's view of the world, suitable for tests and for a
//! single-binary multi-node simulation. A real multi-node deployment
//! would back this trait with a shared store (e.g. Redis); this
//! implementation exists to exercise the contract and as a drop-in for
//! deployments that front several `land-server` processes behind a
//! process-local coordinator.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use land_state::PlayerId;
use tokio::sync::{mpsc, Mutex};

use crate::node::NodeId;
use crate::registry::{ClaimOutcome, RegistryError, SessionRegistry};

struct Lease {
    node: NodeId,
    expires_at: Instant,
}

impl Lease {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory lease table plus one kick inbox per registered node.
#[derive(Default)]
pub struct InMemorySessionRegistry {
    leases: Mutex<HashMap<PlayerId, Lease>>,
    inboxes: Mutex<HashMap<NodeId, mpsc::UnboundedSender<PlayerId>>>,
}

impl InMemorySessionRegistry {
    /// Start an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRegistry for InMemorySessionRegistry {
    async fn claim(&self, player: PlayerId, node: NodeId, ttl: Duration) -> ClaimOutcome {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        let previous = leases.get(&player).and_then(|lease| {
            lease.is_live(now).then(|| lease.node.clone())
        });

        leases.insert(
            player.clone(),
            Lease {
                node: node.clone(),
                expires_at: now + ttl,
            },
        );
        drop(leases);

        match previous {
            Some(previous_node) if previous_node != node => {
                let inboxes = self.inboxes.lock().await;
                if let Some(inbox) = inboxes.get(&previous_node) {
                    let _ = inbox.send(player);
                }
                ClaimOutcome::KickedPrevious { previous_node }
            }
            _ => ClaimOutcome::Claimed,
        }
    }

    async fn renew(&self, player: &PlayerId, node: &NodeId, ttl: Duration) -> Result<(), RegistryError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        match leases.get_mut(player) {
            Some(lease) if &lease.node == node && lease.is_live(now) => {
                lease.expires_at = now + ttl;
                Ok(())
            }
            _ => Err(RegistryError::NotHeld),
        }
    }

    async fn release(&self, player: &PlayerId, node: &NodeId) {
        let mut leases = self.leases.lock().await;
        if leases.get(player).is_some_and(|lease| &lease.node == node) {
            leases.remove(player);
        }
    }

    async fn locate(&self, player: &PlayerId) -> Option<NodeId> {
        let now = Instant::now();
        let leases = self.leases.lock().await;
        leases
            .get(player)
            .filter(|lease| lease.is_live(now))
            .map(|lease| lease.node.clone())
    }

    async fn register_node(&self, node: NodeId) -> mpsc::UnboundedReceiver<PlayerId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inboxes.lock().await.insert(node, tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_claim_is_uncontested() {
        let registry = InMemorySessionRegistry::new();
        let outcome = registry
            .claim(PlayerId::from("p1"), NodeId::from("node-a"), Duration::from_secs(30))
            .await;
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn second_claim_from_another_node_kicks_the_first() {
        let registry = InMemorySessionRegistry::new();
        let mut inbox = registry.register_node(NodeId::from("node-a")).await;

        registry
            .claim(PlayerId::from("p1"), NodeId::from("node-a"), Duration::from_secs(30))
            .await;
        let outcome = registry
            .claim(PlayerId::from("p1"), NodeId::from("node-b"), Duration::from_secs(30))
            .await;

        assert_eq!(
            outcome,
            ClaimOutcome::KickedPrevious {
                previous_node: NodeId::from("node-a")
            }
        );
        assert_eq!(inbox.recv().await, Some(PlayerId::from("p1")));
        assert_eq!(registry.locate(&PlayerId::from("p1")).await, Some(NodeId::from("node-b")));
    }

    #[tokio::test]
    async fn renew_fails_once_another_node_holds_the_lease() {
        let registry = InMemorySessionRegistry::new();
        registry
            .claim(PlayerId::from("p1"), NodeId::from("node-a"), Duration::from_secs(30))
            .await;
        registry
            .claim(PlayerId::from("p1"), NodeId::from("node-b"), Duration::from_secs(30))
            .await;

        let result = registry
            .renew(&PlayerId::from("p1"), &NodeId::from("node-a"), Duration::from_secs(30))
            .await;
        assert_eq!(result, Err(RegistryError::NotHeld));
    }

    #[tokio::test]
    async fn expired_lease_is_reclaimable_without_a_kick() {
        let registry = InMemorySessionRegistry::new();
        let mut inbox = registry.register_node(NodeId::from("node-a")).await;
        registry
            .claim(PlayerId::from("p1"), NodeId::from("node-a"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let outcome = registry
            .claim(PlayerId::from("p1"), NodeId::from("node-b"), Duration::from_secs(30))
            .await;
        assert_eq!(outcome, ClaimOutcome::Claimed);
        assert!(inbox.try_recv().is_err(), "no kick for an already-expired lease");
    }

    #[tokio::test]
    async fn release_clears_locate() {
        let registry = InMemorySessionRegistry::new();
        registry
            .claim(PlayerId::from("p1"), NodeId::from("node-a"), Duration::from_secs(30))
            .await;
        registry.release(&PlayerId::from("p1"), &NodeId::from("node-a")).await;
        assert_eq!(registry.locate(&PlayerId::from("p1")).await, None);
    }
}

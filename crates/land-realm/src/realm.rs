// SPDX-License-Identifier: Apache-2.0
//! The live registry itself: `HashMap<LandID, KeeperHandle>` plus
//! per-type factories.

use std::collections::HashMap;
use std::sync::Arc;

use land_keeper::{KeeperHandle, KeeperOutput};
use land_state::LandId;
use tokio::sync::{broadcast, RwLock};

use crate::error::RealmError;
use crate::factory::RegisteredType;

const OUTPUT_CHANNEL_CAPACITY: usize = 1024;

/// Lifecycle stage of a live Land entry: initializing, running,
/// draining, or terminated; `initializing` collapses into the moment of
/// insertion here since `land-keeper::spawn` starts the loop
/// synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandStatus {
    /// Accepting routes normally.
    Running,
    /// `remove` has been requested; no new routes are accepted and the
    /// Keeper is shutting down.
    Draining,
}

/// One row of [`Realm::list`]'s snapshot.
#[derive(Debug, Clone)]
pub struct RealmSummary {
    /// The live Land.
    pub land_id: LandId,
    /// Its current lifecycle stage.
    pub status: LandStatus,
}

struct LandEntry {
    handle: KeeperHandle,
    outputs: broadcast::Sender<KeeperOutput>,
    status: LandStatus,
}

struct RealmInner {
    types: RwLock<HashMap<Arc<str>, Arc<RegisteredType>>>,
    lands: RwLock<HashMap<LandId, LandEntry>>,
}

/// The process-wide Land registry. Cheaply cloneable; every clone shares
/// the same underlying maps.
#[derive(Clone)]
pub struct Realm(Arc<RealmInner>);

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

impl Realm {
    /// Start an empty registry with no registered types and no live Lands.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(RealmInner {
            types: RwLock::new(HashMap::new()),
            lands: RwLock::new(HashMap::new()),
        }))
    }

    /// Register a `landType`'s factory. Idempotent while no Land of that
    /// type is live; fails once one has been created — overwriting a
    /// `landType` at runtime is forbidden once a Keeper for it exists.
    pub async fn register(
        &self,
        land_type: impl Into<Arc<str>>,
        registered: RegisteredType,
    ) -> Result<(), RealmError> {
        let land_type = land_type.into();
        let lands = self.0.lands.read().await;
        let in_use = lands.keys().any(|id| id.land_type() == &*land_type);
        drop(lands);
        if in_use {
            return Err(RealmError::TypeInUse(land_type.to_string()));
        }
        self.0
            .types
            .write()
            .await
            .insert(land_type, Arc::new(registered));
        Ok(())
    }

    /// Route to the Keeper for `land_id`, creating it first if it does not
    /// yet exist and its type allows auto-create-on-join. A bare-type
    /// `land_id` (no instance) always mints a fresh instance and creates
    /// unconditionally.
    pub async fn route(&self, land_id: LandId) -> Result<KeeperHandle, RealmError> {
        if land_id.has_no_instance() {
            let instance = uuid::Uuid::new_v4().simple().to_string();
            return self.create(land_id.with_instance(instance)).await;
        }

        {
            let lands = self.0.lands.read().await;
            if let Some(entry) = lands.get(&land_id) {
                return match entry.status {
                    LandStatus::Running => Ok(entry.handle.clone()),
                    LandStatus::Draining => Err(RealmError::Draining(land_id.to_string())),
                };
            }
        }

        let allow_auto_create = {
            let types = self.0.types.read().await;
            let registered = types
                .get(land_id.land_type())
                .ok_or_else(|| RealmError::UnknownType(land_id.land_type().to_string()))?;
            registered.allow_auto_create
        };
        if !allow_auto_create {
            return Err(RealmError::AutoCreateDisallowed(land_id.to_string()));
        }
        self.create(land_id).await
    }

    /// Subscribe to a live Land's fanned-out Keeper output (state updates
    /// and server events), for `land-transport` to forward to joined
    /// sessions.
    pub async fn subscribe(&self, land_id: &LandId) -> Option<broadcast::Receiver<KeeperOutput>> {
        self.0
            .lands
            .read()
            .await
            .get(land_id)
            .map(|entry| entry.outputs.subscribe())
    }

    /// Snapshot of every live `LandID` and its lifecycle stage, for admin
    /// listing.
    pub async fn list(&self) -> Vec<RealmSummary> {
        self.0
            .lands
            .read()
            .await
            .iter()
            .map(|(land_id, entry)| RealmSummary {
                land_id: land_id.clone(),
                status: entry.status,
            })
            .collect()
    }

    /// A cloneable handle to a live Land, for admin stat/snapshot queries
    /// that don't need routing semantics.
    pub async fn handle_for(&self, land_id: &LandId) -> Option<KeeperHandle> {
        self.0
            .lands
            .read()
            .await
            .get(land_id)
            .map(|entry| entry.handle.clone())
    }

    /// Begin draining `land_id`: reject further routes, ask its Keeper to
    /// shut down, and evict once it has actually terminated.
    pub async fn remove(&self, land_id: &LandId) -> Result<(), RealmError> {
        let handle = {
            let mut lands = self.0.lands.write().await;
            let entry = lands
                .get_mut(land_id)
                .ok_or_else(|| RealmError::NotFound(land_id.to_string()))?;
            entry.status = LandStatus::Draining;
            entry.handle.clone()
        };
        handle.shutdown().await;
        self.0.lands.write().await.remove(land_id);
        tracing::info!(%land_id, "land drained and evicted");
        Ok(())
    }

    async fn create(&self, land_id: LandId) -> Result<KeeperHandle, RealmError> {
        let mut lands = self.0.lands.write().await;
        if let Some(entry) = lands.get(&land_id) {
            return match entry.status {
                LandStatus::Running => Ok(entry.handle.clone()),
                LandStatus::Draining => Err(RealmError::Draining(land_id.to_string())),
            };
        }

        let registered = {
            let types = self.0.types.read().await;
            types
                .get(land_id.land_type())
                .ok_or_else(|| RealmError::UnknownType(land_id.land_type().to_string()))?
                .clone()
        };

        let (handle, mut raw_outputs) = (registered.spawn)(land_id.clone(), registered.config.clone());
        let (outputs, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
        let forward_outputs = outputs.clone();
        let forward_land_id = land_id.clone();
        let inner = self.0.clone();
        tokio::spawn(async move {
            while let Some(output) = raw_outputs.recv().await {
                let terminated = matches!(output, KeeperOutput::Terminated);
                let _ = forward_outputs.send(output);
                if terminated {
                    inner.lands.write().await.remove(&forward_land_id);
                    tracing::info!(land_id = %forward_land_id, "land terminated itself, evicted");
                    break;
                }
            }
        });

        lands.insert(
            land_id.clone(),
            LandEntry {
                handle: handle.clone(),
                outputs,
                status: LandStatus::Running,
            },
        );
        tracing::info!(%land_id, "land created");
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use land_keeper::{HandlerTable, KeeperConfig};
    use land_state::{Cursor, Field, Snapshot, StateSchema, SyncPolicy};
    use land_wire::SnapshotValue;
    use std::collections::BTreeMap as Map;
    use std::time::Duration;

    struct CounterState {
        count: Field<i64>,
    }

    impl Snapshot for CounterState {
        fn to_snapshot(&self) -> SnapshotValue {
            let mut map = Map::new();
            map.insert("count".to_string(), self.count.to_snapshot());
            SnapshotValue::Map(map)
        }
    }

    struct CounterLand;

    impl land_keeper::LandType for CounterLand {
        type State = CounterState;
        const TYPE_NAME: &'static str = "counter";

        fn schema() -> StateSchema {
            StateSchema::new().field("/count", SyncPolicy::Broadcast)
        }

        fn init(_cursor: &Cursor) -> Self::State {
            CounterState {
                count: Field::new(0_i64, SyncPolicy::Broadcast),
            }
        }

        fn action_handlers() -> HandlerTable<Self::State> {
            HandlerTable::new()
        }
    }

    fn test_config() -> KeeperConfig {
        KeeperConfig {
            idle_timeout: Duration::from_millis(50),
            ..KeeperConfig::default()
        }
    }

    #[tokio::test]
    async fn routing_an_unregistered_type_fails() {
        let realm = Realm::new();
        let err = realm
            .route(LandId::new("counter", "room-1"))
            .await
            .unwrap_err();
        assert_eq!(err, RealmError::UnknownType("counter".to_string()));
    }

    #[tokio::test]
    async fn route_with_no_instance_always_auto_creates() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), false))
            .await
            .unwrap();

        let handle = realm.route(LandId::new("counter", "")).await.unwrap();
        assert_eq!(handle.land_id().land_type(), "counter");
        assert!(!handle.land_id().instance_id().is_empty());
    }

    #[tokio::test]
    async fn auto_create_disallowed_rejects_unknown_instance() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), false))
            .await
            .unwrap();

        let err = realm
            .route(LandId::new("counter", "room-1"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RealmError::AutoCreateDisallowed("counter:room-1".to_string())
        );
    }

    #[tokio::test]
    async fn auto_create_allowed_then_routes_to_the_same_keeper() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();

        let land_id = LandId::new("counter", "room-1");
        let first = realm.route(land_id.clone()).await.unwrap();
        let second = realm.route(land_id.clone()).await.unwrap();
        assert_eq!(first.land_id(), second.land_id());

        let listing = realm.list().await;
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].status, LandStatus::Running);
    }

    #[tokio::test]
    async fn remove_drains_and_evicts() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();

        let land_id = LandId::new("counter", "room-1");
        realm.route(land_id.clone()).await.unwrap();
        realm.remove(&land_id).await.unwrap();

        assert!(realm.list().await.is_empty());
        assert!(realm.handle_for(&land_id).await.is_none());
    }

    #[tokio::test]
    async fn registering_a_type_already_in_use_fails() {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();
        realm.route(LandId::new("counter", "room-1")).await.unwrap();

        let err = realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap_err();
        assert_eq!(err, RealmError::TypeInUse("counter".to_string()));
    }
}

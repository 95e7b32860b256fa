// SPDX-License-Identifier: Apache-2.0
//! The admin HTTP surface: list live Lands, read one Land's stats or
//! state, drain a Land.

use std::str::FromStr as _;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{delete, get};
use axum::{middleware, Router};
use land_realm::{LandStatus, Realm, RealmError};
use land_state::LandId;
use serde::Serialize;

use crate::auth::{require_admin, AdminAuthConfig};
use crate::response::{fail, ApiResponse};

/// Shared state backing every admin route.
#[derive(Clone)]
pub struct AdminState {
    realm: Realm,
}

impl AdminState {
    /// Serve the admin surface over the given [`Realm`].
    #[must_use]
    pub fn new(realm: Realm) -> Self {
        Self { realm }
    }
}

/// Build the admin router, gated by `auth`. Mount it under whatever path
/// prefix the host process chooses; routes are relative to an `/admin`
/// mount point.
#[must_use]
pub fn router(state: AdminState, auth: AdminAuthConfig) -> Router {
    Router::new()
        .route("/lands", get(list_lands))
        .route("/lands/:land_id/stats", get(land_stats))
        .route(
            "/lands/:land_id/reevaluation-record",
            get(land_reevaluation_record),
        )
        .route("/stats", get(realm_stats))
        .route("/lands/:land_id", delete(drain_land))
        .layer(middleware::from_fn_with_state(auth, require_admin))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct LandSummaryDto {
    land_id: String,
    status: &'static str,
}

impl From<land_realm::RealmSummary> for LandSummaryDto {
    fn from(summary: land_realm::RealmSummary) -> Self {
        Self {
            land_id: summary.land_id.to_string(),
            status: match summary.status {
                LandStatus::Running => "running",
                LandStatus::Draining => "draining",
            },
        }
    }
}

async fn list_lands(State(state): State<AdminState>) -> Response {
    let lands: Vec<LandSummaryDto> = state
        .realm
        .list()
        .await
        .into_iter()
        .map(LandSummaryDto::from)
        .collect();
    ApiResponse::ok(lands)
}

#[derive(Debug, Serialize)]
struct RealmStatsDto {
    land_count: usize,
    draining_count: usize,
}

async fn realm_stats(State(state): State<AdminState>) -> Response {
    let lands = state.realm.list().await;
    let draining_count = lands
        .iter()
        .filter(|summary| summary.status == LandStatus::Draining)
        .count();
    ApiResponse::ok(RealmStatsDto {
        land_count: lands.len(),
        draining_count,
    })
}

fn parse_land_id(raw: &str) -> LandId {
    // `LandId::from_str` is infallible (land-state::ids), so this never
    // rejects a path segment outright; an unknown land_type/instance pair
    // simply won't resolve to a live Land below.
    LandId::from_str(raw).unwrap_or_else(|absurd: std::convert::Infallible| match absurd {})
}

async fn land_stats(State(state): State<AdminState>, Path(land_id): Path<String>) -> Response {
    let land_id = parse_land_id(&land_id);
    let Some(handle) = state.realm.handle_for(&land_id).await else {
        return not_found(&land_id);
    };
    match handle.stats().await {
        Some(stats) => ApiResponse::ok(stats),
        None => not_found(&land_id),
    }
}

async fn land_reevaluation_record(
    State(state): State<AdminState>,
    Path(land_id): Path<String>,
) -> Response {
    let land_id = parse_land_id(&land_id);
    let Some(handle) = state.realm.handle_for(&land_id).await else {
        return not_found(&land_id);
    };
    match handle.snapshot().await {
        Some(snapshot) => ApiResponse::ok(snapshot),
        None => not_found(&land_id),
    }
}

async fn drain_land(State(state): State<AdminState>, Path(land_id): Path<String>) -> Response {
    let land_id = parse_land_id(&land_id);
    match state.realm.remove(&land_id).await {
        Ok(()) => ApiResponse::ok(()),
        Err(RealmError::NotFound(id)) => fail(StatusCode::NOT_FOUND, format!("land not found: {id}")),
        Err(RealmError::Draining(id)) => {
            fail(StatusCode::CONFLICT, format!("land already draining: {id}"))
        }
        Err(other) => fail(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

fn not_found(land_id: &LandId) -> Response {
    fail(StatusCode::NOT_FOUND, format!("land not found: {land_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use land_keeper::{HandlerTable, KeeperConfig};
    use land_realm::RegisteredType;
    use land_state::{Cursor, Field, Snapshot, StateSchema, SyncPolicy};
    use land_wire::SnapshotValue;
    use serde_json::Value;
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
            idle_timeout: Duration::from_millis(200),
            ..KeeperConfig::default()
        }
    }

    async fn seeded_realm() -> Realm {
        let realm = Realm::new();
        realm
            .register("counter", RegisteredType::new::<CounterLand>(test_config(), true))
            .await
            .unwrap();
        realm.route(LandId::new("counter", "room-1")).await.unwrap();
        realm
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn listing_lands_reports_the_live_land() {
        let realm = seeded_realm().await;
        let response = list_lands(State(AdminState::new(realm))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["result"][0]["land_id"], "counter:room-1");
        assert_eq!(body["result"][0]["status"], "running");
    }

    #[tokio::test]
    async fn stats_for_unknown_land_is_not_found() {
        let response = land_stats(
            State(AdminState::new(Realm::new())),
            Path("counter:missing".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn stats_for_a_live_land_reports_its_player_count() {
        let realm = seeded_realm().await;
        let response = land_stats(
            State(AdminState::new(realm)),
            Path("counter:room-1".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["player_count"], 0);
    }

    #[tokio::test]
    async fn draining_a_live_land_then_evicts_it() {
        let realm = seeded_realm().await;
        let response = drain_land(
            State(AdminState::new(realm.clone())),
            Path("counter:room-1".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(realm.list().await.is_empty());
    }

    #[tokio::test]
    async fn draining_an_unknown_land_is_not_found() {
        let response = drain_land(
            State(AdminState::new(Realm::new())),
            Path("counter:missing".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// SPDX-License-Identifier: Apache-2.0
//! LandKeeper's host process: builds a [`land_realm::Realm`], registers
//! the reference Land types, and serves the WebSocket gateway
//! (`land-transport`) alongside the read/drain admin API (`land-admin`)
//! off one `axum` listener.
//!
//! This binary is deliberately thin — it is the assembly point, not a
//! place for protocol logic. A real deployment swaps `land-demo`'s
//! `counter`/`arena` fixtures for its own registered [`land_keeper::LandType`]s.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use land_app_core::{ConfigService, FsConfigStore, LandConfig};
use land_demo::{ArenaLand, CounterLand};
use land_keeper::KeeperConfig;
use land_realm::{Realm, RegisteredType};
use land_transport::{GatewayState, TransportConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "LandKeeper realtime state-sync server")]
struct Args {
    /// TCP listener for client WebSocket connections and the admin API.
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,
    /// Directory to load/persist per-`landType` `LandConfig` JSON files
    /// from. Omit to run every registered type with `LandConfig::default()`.
    #[arg(long)]
    config_dir: Option<PathBuf>,
    /// API key required on the `x-admin-api-key` header for `/admin/*`
    /// routes. Omit to leave the admin surface unreachable (it still
    /// mounts, but every request is rejected) — there is no "open admin"
    /// mode.
    #[arg(long)]
    admin_api_key: Option<String>,
    /// Disable guest-mode joins (a join with no `playerId` is rejected
    /// instead of minting a guest identity).
    #[arg(long)]
    no_guest_mode: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let realm = Realm::new();
    register_land_types(&realm, args.config_dir.as_deref()).await?;

    let transport_config = TransportConfig {
        allow_guest_mode: !args.no_guest_mode,
        ..TransportConfig::default()
    };
    let gateway_state = GatewayState::new(realm.clone(), transport_config);

    let admin_auth = match &args.admin_api_key {
        Some(key) => land_admin::AdminAuthConfig::with_api_key(key.clone()),
        None => land_admin::AdminAuthConfig::default(),
    };
    let admin_state = land_admin::AdminState::new(realm.clone());

    let app = Router::new()
        .merge(land_transport::router(gateway_state))
        .nest("/admin", land_admin::router(admin_state, admin_auth));

    info!(listen = %args.listen, "landkeeper server listening");
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("serving landkeeper")?;

    Ok(())
}

/// Register this process's `landType`s. `land-demo`'s `counter` and
/// `arena` are the only ones shipped here; a production deployment
/// replaces this function's body with its own [`land_keeper::LandType`]s.
async fn register_land_types(realm: &Realm, config_dir: Option<&std::path::Path>) -> Result<()> {
    let counter_config = keeper_config(load_land_config(config_dir, "counter")?);
    realm
        .register("counter", RegisteredType::new::<CounterLand>(counter_config, true))
        .await
        .context("registering counter land type")?;

    let arena_config = keeper_config(load_land_config(config_dir, "arena")?);
    realm
        .register("arena", RegisteredType::new::<ArenaLand>(arena_config, true))
        .await
        .context("registering arena land type")?;

    Ok(())
}

/// Load a `landType`'s persisted [`LandConfig`], or its default when no
/// `config_dir` was given or no file exists yet for that key.
fn load_land_config(config_dir: Option<&std::path::Path>, land_type: &str) -> Result<LandConfig> {
    let Some(dir) = config_dir else {
        return Ok(LandConfig::default());
    };
    let store = FsConfigStore::at(dir.to_path_buf())
        .with_context(|| format!("opening config store at {}", dir.display()))?;
    let service = ConfigService::new(store);
    Ok(service
        .load(land_type)
        .with_context(|| format!("loading land config for {land_type}"))?
        .unwrap_or_default())
}

fn keeper_config(land_config: LandConfig) -> KeeperConfig {
    KeeperConfig {
        tick_interval: land_config.tick_interval(),
        sync_every_ticks: land_config.state_sync_every_ticks,
        idle_timeout: land_config.idle_timeout(),
        max_players: land_config.max_players(),
        dirty_tracking: land_config.dirty_tracking.to_mode(),
        ..KeeperConfig::default()
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("failed to install ctrl-c handler; shutdown will only happen on kill");
    }
}

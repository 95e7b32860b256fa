// SPDX-License-Identifier: Apache-2.0
//! The per-Land tick loop: the only place a Land's state is ever
//! mutated.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use land_state::{Cursor, LandId, PatchRecorder, PlayerId, PlayerSlotAllocator, Snapshot};
use land_sync::{FieldPolicyTable, SyncEngine};
use land_wire::SnapshotValue;
use tokio::sync::mpsc;

use crate::command::{
    ActionCommand, AdminCommand, ClientEventCommand, Command, JoinCommand, JoinOutcome,
    KeeperConfig, KeeperOutput, KeeperStats, LeaveCommand,
};
use crate::error::{ActionError, HandlerError, JoinError};
use crate::handler::{EmittedEvent, HandlerCtx, LandType, ResolverCtx, TickCtx};
use crate::services::Services;

struct JoinedPlayer {
    slot: land_state::PlayerSlot,
}

/// Derive the set of top-level container paths touched by `patches`, used
/// to scope a dirty-snapshot-diff rebuild. A patch at
/// `/players/p1/score` contributes the root `/players`; a patch at `/turn`
/// contributes `/turn` itself.
fn dirty_roots_from_patches(patches: &[land_state::ScopedPatch]) -> Vec<String> {
    let mut roots = Vec::new();
    for scoped in patches {
        let path = &scoped.patch.path;
        let root = path
            .get(1..)
            .and_then(|rest| rest.find('/'))
            .map_or_else(|| path.clone(), |idx| path[..idx + 1].to_string());
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

/// The single-writer Land Keeper loop for one Land instance of type `L`.
///
/// Built with [`Keeper::new`] and driven with [`Keeper::run`]; callers
/// should not construct one directly in production code but go through
/// [`spawn`], which puts the loop on a dedicated thread under a
/// `tokio::task::LocalSet` so `land-state`'s `!Send` cursor model never has
/// to cross a `tokio::spawn` boundary.
pub struct Keeper<L: LandType> {
    land_id: LandId,
    state: L::State,
    patch_recorder: Rc<PatchRecorder>,
    action_handlers: crate::handler::HandlerTable<L::State>,
    event_handlers: crate::handler::HandlerTable<L::State>,
    policy_table: FieldPolicyTable,
    sync_engine: SyncEngine,
    services: Services,
    players: BTreeMap<PlayerId, JoinedPlayer>,
    slot_alloc: PlayerSlotAllocator,
    config: KeeperConfig,
    tick_count: u64,
}

impl<L: LandType> Keeper<L> {
    /// Build a fresh Keeper for a brand-new Land instance.
    #[must_use]
    pub fn new(land_id: LandId, config: KeeperConfig) -> Self {
        let patch_recorder = Rc::new(PatchRecorder::new());
        let cursor = Cursor::recording(&patch_recorder);
        let state = L::init(&cursor);
        patch_recorder.drain(); // initial construction patches are not a tick's diff

        Self {
            land_id,
            state,
            patch_recorder,
            action_handlers: L::action_handlers(),
            event_handlers: L::event_handlers(),
            policy_table: FieldPolicyTable::from_schema(&L::schema()),
            sync_engine: SyncEngine::new(config.dirty_tracking, config.sync_every_ticks),
            services: Services::live(config.rng_seed),
            players: BTreeMap::new(),
            slot_alloc: PlayerSlotAllocator::new(),
            config,
            tick_count: 0,
        }
    }

    fn cursor(&self) -> Cursor {
        Cursor::recording(&self.patch_recorder)
    }

    fn handle_join(&mut self, cmd: JoinCommand, output: &mpsc::UnboundedSender<KeeperOutput>) {
        let JoinCommand {
            player, respond, ..
        } = cmd;

        if self.players.contains_key(&player) {
            let _ = respond.send(Err(JoinError::AlreadyJoined));
            return;
        }
        if let Some(max) = self.config.max_players {
            if self.players.len() >= max as usize {
                let _ = respond.send(Err(JoinError::LandFull));
                return;
            }
        }

        let slot = self.slot_alloc.allocate();
        let cursor = self.cursor();
        L::on_join(&mut self.state, &cursor, &player, slot);
        self.sync_engine.register_player(player.clone());
        self.players.insert(player, JoinedPlayer { slot });

        let _ = respond.send(Ok(JoinOutcome { slot }));
        self.do_sync(output);
    }

    fn handle_leave(&mut self, cmd: LeaveCommand, output: &mpsc::UnboundedSender<KeeperOutput>) {
        let LeaveCommand { player } = cmd;
        if let Some(joined) = self.players.remove(&player) {
            let cursor = self.cursor();
            L::on_leave(&mut self.state, &cursor, &player);
            self.sync_engine.remove_player(&player);
            self.slot_alloc.release(joined.slot);
            self.patch_recorder.drain();
            self.do_sync(output);
        }
    }

    async fn handle_action(&mut self, cmd: ActionCommand, output: &mpsc::UnboundedSender<KeeperOutput>) {
        let ActionCommand {
            session,
            client,
            player,
            payload,
            respond,
        } = cmd;

        let Some(handler) = self.action_handlers.get(&payload.type_identifier) else {
            let _ = respond.send(Err(ActionError::Handler(HandlerError::UnknownAction(
                payload.type_identifier.clone(),
            ))));
            return;
        };

        let resolver_ctx = ResolverCtx {
            player: &player,
            client: &client,
            session,
            services: &self.services,
            payload: &payload.payload,
        };
        let resolved = match Self::run_resolvers(handler, &resolver_ctx).await {
            Ok(resolved) => resolved,
            Err(err) => {
                let _ = respond.send(Err(ActionError::Handler(err)));
                return;
            }
        };

        let mut emitted = Vec::new();
        let mut sync_requested = false;
        let cursor = self.cursor();
        let mut ctx = HandlerCtx {
            player: &player,
            client: &client,
            session,
            services: &self.services,
            resolved: &resolved,
            emitted: &mut emitted,
            sync_requested: &mut sync_requested,
        };
        let result = (handler.run)(&mut self.state, &cursor, payload.payload, &mut ctx);

        self.dispatch_emitted(emitted, output);
        match result {
            Ok(value) => {
                let _ = respond.send(Ok(value));
            }
            Err(err) => {
                let _ = respond.send(Err(ActionError::Handler(err)));
            }
        }
        if sync_requested {
            self.do_sync(output);
        }
    }

    async fn handle_client_event(
        &mut self,
        cmd: ClientEventCommand,
        output: &mpsc::UnboundedSender<KeeperOutput>,
    ) {
        let ClientEventCommand {
            session,
            client,
            player,
            event_type,
            payload,
            respond,
        } = cmd;

        let Some(handler) = self.event_handlers.get(&event_type) else {
            let _ = respond.send(Err(ActionError::Handler(HandlerError::UnknownAction(
                event_type,
            ))));
            return;
        };

        let resolver_ctx = ResolverCtx {
            player: &player,
            client: &client,
            session,
            services: &self.services,
            payload: &payload,
        };
        let resolved = match Self::run_resolvers(handler, &resolver_ctx).await {
            Ok(resolved) => resolved,
            Err(err) => {
                let _ = respond.send(Err(ActionError::Handler(err)));
                return;
            }
        };

        let mut emitted = Vec::new();
        let mut sync_requested = false;
        let cursor = self.cursor();
        let mut ctx = HandlerCtx {
            player: &player,
            client: &client,
            session,
            services: &self.services,
            resolved: &resolved,
            emitted: &mut emitted,
            sync_requested: &mut sync_requested,
        };
        let result = (handler.run)(&mut self.state, &cursor, payload, &mut ctx);

        self.dispatch_emitted(emitted, output);
        match result {
            Ok(_) => {
                let _ = respond.send(Ok(()));
            }
            Err(err) => {
                let _ = respond.send(Err(ActionError::Handler(err)));
            }
        }
        if sync_requested {
            self.do_sync(output);
        }
    }

    async fn run_resolvers(
        handler: &crate::handler::HandlerDef<L::State>,
        ctx: &ResolverCtx<'_>,
    ) -> Result<BTreeMap<String, SnapshotValue>, HandlerError> {
        if handler.resolvers.is_empty() {
            return Ok(BTreeMap::new());
        }
        let futures = handler.resolvers.iter().map(|resolver| {
            let name = resolver.name;
            let fut = (resolver.resolve)(ctx);
            async move {
                fut.await
                    .map(|value| (name.to_string(), value))
                    .map_err(|source| crate::error::ResolverError::wrap(name, source))
            }
        });
        let results = futures_util::future::try_join_all(futures)
            .await
            .map_err(HandlerError::Resolver)?;
        Ok(results.into_iter().collect())
    }

    fn dispatch_emitted(&self, emitted: Vec<EmittedEvent>, output: &mpsc::UnboundedSender<KeeperOutput>) {
        for event in emitted {
            let _ = output.send(KeeperOutput::ServerEvent {
                target: event.target,
                event_type: event.event_type,
                payload: event.payload,
            });
        }
    }

    fn handle_admin(&mut self, cmd: AdminCommand, output: &mpsc::UnboundedSender<KeeperOutput>) -> bool {
        match cmd {
            AdminCommand::Stats { respond } => {
                let _ = respond.send(KeeperStats {
                    land_id: self.land_id.to_string(),
                    player_count: self.players.len(),
                    tick_count: self.tick_count,
                });
                true
            }
            AdminCommand::Snapshot { respond } => {
                let _ = respond.send(self.state.to_snapshot());
                true
            }
            AdminCommand::ForceTick { respond } => {
                self.fire_tick(output);
                let _ = respond.send(());
                true
            }
            AdminCommand::Shutdown { respond } => {
                let _ = respond.send(());
                false
            }
        }
    }

    /// Compute the Sync Engine pass and push resulting per-player updates
    /// to `output`. Shared by the scheduled tick path and an out-of-band
    /// `request_sync_now` from a handler.
    fn do_sync(&mut self, output: &mpsc::UnboundedSender<KeeperOutput>) {
        let patches = self.patch_recorder.drain();
        let dirty_roots = dirty_roots_from_patches(&patches);
        // land-state's container primitives (`Field::set`, `ReactiveMap`/
        // `ReactiveSet` mutators) always record a patch in the same
        // operation that marks a path dirty, so coverage holds by
        // construction for any Land built from them.
        let coverage_ok = true;
        let full_snapshot = self.state.to_snapshot();
        let updates = self.sync_engine.tick(
            &patches,
            coverage_ok,
            &dirty_roots,
            &full_snapshot,
            &self.policy_table,
        );
        for (player, payload) in updates {
            let _ = output.send(KeeperOutput::StateUpdate { player, payload });
        }
    }

    fn fire_tick(&mut self, output: &mpsc::UnboundedSender<KeeperOutput>) {
        let mut emitted = Vec::new();
        {
            let cursor = self.cursor();
            let mut ctx = TickCtx {
                services: &self.services,
                emitted: &mut emitted,
            };
            L::on_tick(&mut self.state, &cursor, &mut ctx);
        }
        self.dispatch_emitted(emitted, output);
        self.do_sync(output);
        self.tick_count += 1;
    }

    /// Drive this Keeper's command queue and (if configured) its tick
    /// scheduler until every [`crate::handle::KeeperHandle`] referencing it
    /// is dropped, an [`AdminCommand::Shutdown`] arrives, or it sits idle
    /// with no joined players past `idle_timeout`.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        output: mpsc::UnboundedSender<KeeperOutput>,
    ) {
        let mut ticker = self.config.tick_interval.map(tokio::time::interval);
        let mut idle_check = tokio::time::interval(Duration::from_secs(1).min(self.config.idle_timeout));
        let mut idle_since = if self.players.is_empty() {
            Some(Instant::now())
        } else {
            None
        };

        loop {
            tokio::select! {
                biased;

                maybe_cmd = commands.recv() => {
                    let Some(cmd) = maybe_cmd else {
                        tracing::debug!(land_id = %self.land_id, "all keeper handles dropped, terminating");
                        break;
                    };
                    let is_admin_shutdown = matches!(cmd, Command::Admin(AdminCommand::Shutdown { .. }));
                    match cmd {
                        Command::Join(join) => self.handle_join(join, &output),
                        Command::Leave(leave) => self.handle_leave(leave, &output),
                        Command::Action(action) => self.handle_action(action, &output).await,
                        Command::ClientEvent(event) => self.handle_client_event(event, &output).await,
                        Command::Admin(admin) => {
                            self.handle_admin(admin, &output);
                        }
                    }
                    if is_admin_shutdown {
                        tracing::info!(land_id = %self.land_id, "keeper shutdown requested");
                        break;
                    }
                    idle_since = if self.players.is_empty() {
                        idle_since.or_else(|| Some(Instant::now()))
                    } else {
                        None
                    };
                }

                _ = async {
                    match ticker.as_mut() {
                        Some(t) => { t.tick().await; }
                        None => std::future::pending::<()>().await,
                    }
                }, if ticker.is_some() => {
                    self.fire_tick(&output);
                }

                _ = idle_check.tick(), if idle_since.is_some() => {
                    if idle_since.is_some_and(|since| since.elapsed() >= self.config.idle_timeout) {
                        tracing::info!(land_id = %self.land_id, "keeper idle timeout reached, terminating");
                        break;
                    }
                }
            }
        }

        // Reject whatever is still queued rather than dropping it silently.
        commands.close();
        while let Ok(cmd) = commands.try_recv() {
            reject_queued(cmd);
        }
        let _ = output.send(KeeperOutput::Terminated);
    }
}

fn reject_queued(cmd: Command) {
    match cmd {
        Command::Join(join) => {
            let _ = join.respond.send(Err(JoinError::ShuttingDown));
        }
        Command::Leave(_) => {}
        Command::Action(action) => {
            let _ = action.respond.send(Err(ActionError::ShuttingDown));
        }
        Command::ClientEvent(event) => {
            let _ = event.respond.send(Err(ActionError::ShuttingDown));
        }
        Command::Admin(AdminCommand::Stats { respond }) => {
            drop(respond);
        }
        Command::Admin(AdminCommand::Snapshot { respond }) => {
            drop(respond);
        }
        Command::Admin(AdminCommand::ForceTick { respond }) => {
            drop(respond);
        }
        Command::Admin(AdminCommand::Shutdown { respond }) => {
            let _ = respond.send(());
        }
    }
}

/// Spawn a Keeper on a dedicated OS thread, running inside a
/// `tokio::task::LocalSet` on a fresh current-thread runtime, and return
/// the [`crate::handle::KeeperHandle`] other tasks use to reach it.
///
/// A plain `tokio::spawn` requires its future to be `Send`; `land-state`'s
/// cursor model (`Rc`/`RefCell`) is not. Giving each Land its own thread
/// preserves "one task per Land, no shared lock" without requiring the
/// state tree itself to be thread-safe.
pub fn spawn<L: LandType>(
    land_id: LandId,
    config: KeeperConfig,
) -> (crate::handle::KeeperHandle, mpsc::UnboundedReceiver<KeeperOutput>) {
    let (command_tx, command_rx) = mpsc::channel(256);
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let handle_land_id = land_id.clone();
    let thread_name = format!("land-keeper:{land_id}");

    #[allow(clippy::expect_used)] // Documented panic: a runtime this thread owns exclusively has no fallback path.
    let thread_body = move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("building a current-thread runtime for a Land Keeper");
        let local = tokio::task::LocalSet::new();
        local.block_on(&runtime, async move {
            let keeper = Keeper::<L>::new(land_id, config);
            keeper.run(command_rx, output_tx).await;
        });
    };

    #[allow(clippy::expect_used)] // Documented panic: the Keeper thread could not be spawned at all.
    std::thread::Builder::new()
        .name(thread_name)
        .spawn(thread_body)
        .expect("spawning a Land Keeper OS thread");

    (
        crate::handle::KeeperHandle::new(handle_land_id, command_tx),
        output_rx,
    )
}

/// Run a Keeper in-process on the caller's own `LocalSet`, for tests that
/// want to drive the loop without a dedicated thread.
#[cfg(any(test, feature = "test-util"))]
pub fn spawn_local<L: LandType>(
    land_id: LandId,
    config: KeeperConfig,
    local: &tokio::task::LocalSet,
) -> (crate::handle::KeeperHandle, mpsc::UnboundedReceiver<KeeperOutput>) {
    let (command_tx, command_rx) = mpsc::channel(256);
    let (output_tx, output_rx) = mpsc::unbounded_channel();
    let handle_land_id = land_id.clone();
    local.spawn_local(async move {
        let keeper = Keeper::<L>::new(land_id, config);
        keeper.run(command_rx, output_tx).await;
    });
    (
        crate::handle::KeeperHandle::new(handle_land_id, command_tx),
        output_rx,
    )
}

// SPDX-License-Identifier: Apache-2.0
//! Handler dispatch: the `LandType` trait a concrete Land implements, and
//! the resolver/handler machinery the Keeper drives each command
//! through.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use land_state::{ClientId, Cursor, PlayerId, PlayerSlot, SessionId, Snapshot, StateSchema};
use land_wire::SnapshotValue;

use crate::error::HandlerError;
use crate::services::Services;

/// Where an Event emitted from inside a handler or the tick hook should
/// be delivered.
#[derive(Debug, Clone)]
pub enum TargetSelector {
    /// Every currently-joined player.
    All,
    /// A single named player.
    Player(PlayerId),
    /// Every joined player except the named one.
    Others(PlayerId),
    /// An explicit list of players.
    List(Vec<PlayerId>),
}

impl TargetSelector {
    /// Resolve this selector against a roster of currently-joined players.
    /// `land-realm`/`land-transport` call this once they have concrete
    /// per-session delivery targets for a [`crate::command::KeeperOutput::ServerEvent`].
    pub fn resolve<'a>(
        &'a self,
        roster: impl Iterator<Item = &'a PlayerId>,
    ) -> Vec<PlayerId> {
        match self {
            Self::All => roster.cloned().collect(),
            Self::Player(player) => vec![player.clone()],
            Self::Others(excluded) => roster.filter(|p| *p != excluded).cloned().collect(),
            Self::List(players) => players.clone(),
        }
    }
}

/// A `(target, event_type, payload)` emitted while a handler or the tick
/// hook was running.
pub(crate) struct EmittedEvent {
    pub target: TargetSelector,
    pub event_type: String,
    pub payload: SnapshotValue,
}

/// Context handed to a resolver. Carries only the caller's identity and the
/// raw action/event payload — resolvers run before the handler body and
/// never see Land state.
pub struct ResolverCtx<'a> {
    /// The player who issued the command.
    pub player: &'a PlayerId,
    /// The connection that carried the command.
    pub client: &'a ClientId,
    /// The session the command arrived on.
    pub session: SessionId,
    /// Injected non-deterministic collaborators.
    pub services: &'a Services,
    /// The raw payload of the action or event being resolved for.
    pub payload: &'a SnapshotValue,
}

/// The future type a resolver returns.
pub type ResolverFuture<'a> = Pin<Box<dyn Future<Output = Result<SnapshotValue, anyhow::Error>> + 'a>>;

/// A single named, asynchronous pre-load step. All of a handler's
/// resolvers run concurrently before the handler body executes; if any
/// fails, the others are cancelled and the failure (wrapped with this
/// resolver's name) becomes the command's error.
pub struct ResolverDef {
    /// The name resolved values are keyed by in [`HandlerCtx::resolved`],
    /// and the name a failure is reported under.
    pub name: &'static str,
    /// The resolve function itself.
    pub resolve: Box<dyn for<'a> Fn(&'a ResolverCtx<'a>) -> ResolverFuture<'a>>,
}

/// Context handed to a handler body. The handler is a synchronous
/// function: only the resolver pre-load phase above it is async.
pub struct HandlerCtx<'a> {
    /// The player who issued the command.
    pub player: &'a PlayerId,
    /// The connection that carried the command.
    pub client: &'a ClientId,
    /// The session the command arrived on.
    pub session: SessionId,
    /// Injected non-deterministic collaborators.
    pub services: &'a Services,
    /// Values produced by this handler's resolvers, keyed by resolver
    /// name.
    pub resolved: &'a BTreeMap<String, SnapshotValue>,
    pub(crate) emitted: &'a mut Vec<EmittedEvent>,
    pub(crate) sync_requested: &'a mut bool,
}

impl HandlerCtx<'_> {
    /// Queue an Event for delivery once this command finishes processing.
    pub fn send_event(
        &mut self,
        target: TargetSelector,
        event_type: impl Into<String>,
        payload: SnapshotValue,
    ) {
        self.emitted.push(EmittedEvent {
            target,
            event_type: event_type.into(),
            payload,
        });
    }

    /// Request an immediate out-of-band sync pass after this command,
    /// instead of waiting for the next scheduled tick.
    pub fn request_sync_now(&mut self) {
        *self.sync_requested = true;
    }
}

/// Context handed to [`LandType::on_tick`].
pub struct TickCtx<'a> {
    /// Injected non-deterministic collaborators.
    pub services: &'a Services,
    pub(crate) emitted: &'a mut Vec<EmittedEvent>,
}

impl TickCtx<'_> {
    /// Queue an Event for delivery at the end of this tick.
    pub fn send_event(
        &mut self,
        target: TargetSelector,
        event_type: impl Into<String>,
        payload: SnapshotValue,
    ) {
        self.emitted.push(EmittedEvent {
            target,
            event_type: event_type.into(),
            payload,
        });
    }
}

/// One registered action or client-event handler for a Land's state type.
pub struct HandlerDef<S> {
    /// Resolvers run (concurrently, cancel-on-first-failure) before `run`.
    pub resolvers: Vec<ResolverDef>,
    /// The handler body. Synchronous: state mutation, patch recording, and
    /// the response value all happen here.
    pub run: Box<dyn Fn(&mut S, &Cursor, SnapshotValue, &mut HandlerCtx<'_>) -> Result<SnapshotValue, HandlerError>>,
}

/// A Land type's registered handlers, keyed by `type_identifier`
/// (the action type or client event type named on the wire).
pub type HandlerTable<S> = BTreeMap<String, HandlerDef<S>>;

/// What a concrete Land implements to be hosted by a [`crate::keeper::Keeper`].
///
/// `on_join`/`on_leave`/`on_tick` default to no-ops; a Land only overrides
/// the lifecycle hooks it cares about.
pub trait LandType: 'static {
    /// The concrete, Land-specific state tree. Must implement
    /// [`Snapshot`] so the Sync Engine can render full snapshots for
    /// first-sync and dirty-snapshot-diff.
    type State: Snapshot;

    /// The Land type name this implementation is registered under.
    const TYPE_NAME: &'static str;

    /// The field schema (path -> sync policy) the Sync Engine filters
    /// snapshots against.
    fn schema() -> StateSchema;

    /// Build a fresh, empty state tree for a newly created Land instance.
    fn init(cursor: &Cursor) -> Self::State;

    /// The registered `action` handlers, dispatched by `type_identifier`.
    fn action_handlers() -> HandlerTable<Self::State>;

    /// The registered client-event handlers, dispatched by
    /// `type_identifier`. Defaults to none: a Land with no client-driven
    /// events simply never populates this table.
    fn event_handlers() -> HandlerTable<Self::State> {
        BTreeMap::new()
    }

    /// Run once per scheduled tick, before the Sync Engine computes this
    /// tick's per-player updates. The default does nothing, for
    /// purely event-driven Lands.
    fn on_tick(_state: &mut Self::State, _cursor: &Cursor, _ctx: &mut TickCtx<'_>) {}

    /// Run when a player successfully joins, after slot allocation and
    /// before the first sync is computed.
    fn on_join(
        _state: &mut Self::State,
        _cursor: &Cursor,
        _player: &PlayerId,
        _slot: PlayerSlot,
    ) {
    }

    /// Run when a player leaves or their session is dropped.
    fn on_leave(_state: &mut Self::State, _cursor: &Cursor, _player: &PlayerId) {}
}

#[cfg(test)]
mod tests {
    use super::TargetSelector;
    use land_state::PlayerId;

    #[test]
    fn others_excludes_named_player() {
        let roster = vec![
            PlayerId::from("a"),
            PlayerId::from("b"),
            PlayerId::from("c"),
        ];
        let resolved = TargetSelector::Others(PlayerId::from("b")).resolve(roster.iter());
        assert_eq!(resolved, vec![PlayerId::from("a"), PlayerId::from("c")]);
    }

    #[test]
    fn all_includes_every_player() {
        let roster = vec![PlayerId::from("a"), PlayerId::from("b")];
        let resolved = TargetSelector::All.resolve(roster.iter());
        assert_eq!(resolved, roster);
    }
}

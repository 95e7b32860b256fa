// SPDX-License-Identifier: Apache-2.0
//! The Transport Adapter's per-connection state machine:
//! `AwaitingJoin → Joined → Closed`. `New` collapses into `AwaitingJoin`
//! here since nothing observes a session between socket accept and its
//! first frame.

use std::sync::Arc;

use land_realm::Realm;
use land_state::{ClientId, LandId, PlayerId, SessionId};
use land_wire::{
    ActionResponsePayload, Encoding, ErrorCode, ErrorPayload, EventDirection, JoinPayload,
    JoinResponsePayload, TransportMessage,
};

use crate::fanout::{FanoutRegistry, LandFanout, SessionOutbox};

/// Mints a [`PlayerId`] for a join request that supplied none, when
/// guest mode is enabled.
pub type GuestFactory = Arc<dyn Fn(&JoinPayload) -> PlayerId + Send + Sync>;

fn default_guest_factory() -> GuestFactory {
    Arc::new(|_payload: &JoinPayload| {
        PlayerId::new(format!("guest-{}", uuid::Uuid::new_v4().simple()))
    })
}

/// Adapter-wide policy, independent of any one connection.
#[derive(Clone)]
pub struct TransportConfig {
    /// Whether a join with no `player_id` is accepted by minting a guest
    /// identity, or rejected as unauthorized.
    pub allow_guest_mode: bool,
    /// How a guest identity is minted when `allow_guest_mode` is set.
    pub guest_factory: GuestFactory,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            allow_guest_mode: true,
            guest_factory: default_guest_factory(),
        }
    }
}

struct JoinedState {
    player: PlayerId,
    keeper: land_keeper::KeeperHandle,
    fanout: LandFanout,
}

enum SessionState {
    AwaitingJoin,
    Joined(JoinedState),
    Closed,
}

/// The result of feeding one inbound frame through [`Session::handle`].
pub struct HandleOutcome {
    /// Frames to send back on this connection, in order.
    pub replies: Vec<TransportMessage>,
    /// Set exactly once, the tick this session joins: the fan-out outbox
    /// the connection loop should start forwarding from.
    pub subscribe: Option<SessionOutbox>,
    /// Whether the connection should close after sending `replies`.
    pub close: bool,
}

impl HandleOutcome {
    fn reply(msg: TransportMessage) -> Self {
        Self {
            replies: vec![msg],
            subscribe: None,
            close: false,
        }
    }

    fn reply_and_close(msg: TransportMessage) -> Self {
        Self {
            replies: vec![msg],
            subscribe: None,
            close: true,
        }
    }

    fn nothing() -> Self {
        Self {
            replies: Vec::new(),
            subscribe: None,
            close: false,
        }
    }
}

/// One WebSocket connection's protocol state.
pub struct Session {
    session_id: SessionId,
    client_id: ClientId,
    encoding: Encoding,
    state: SessionState,
}

impl Session {
    /// A fresh, pre-join session. Encoding defaults to JSON until a join
    /// negotiates otherwise.
    #[must_use]
    pub fn new(session_id: SessionId, client_id: ClientId) -> Self {
        Self {
            session_id,
            client_id,
            encoding: Encoding::Json,
            state: SessionState::AwaitingJoin,
        }
    }

    /// The session's current negotiated (or default) encoding.
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Feed one decoded inbound frame through the state machine.
    pub async fn handle(
        &mut self,
        msg: TransportMessage,
        realm: &Realm,
        fanouts: &FanoutRegistry,
        config: &TransportConfig,
    ) -> HandleOutcome {
        match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::AwaitingJoin => self.handle_awaiting_join(msg, realm, fanouts, config).await,
            SessionState::Joined(joined) => self.handle_joined(joined, msg).await,
            SessionState::Closed => HandleOutcome {
                replies: Vec::new(),
                subscribe: None,
                close: true,
            },
        }
    }

    /// Leave the joined Land, if any. Called once on disconnect.
    pub async fn leave(&mut self) {
        if let SessionState::Joined(joined) = std::mem::replace(&mut self.state, SessionState::Closed) {
            joined.fanout.unregister(&joined.player).await;
            joined.keeper.leave(joined.player).await;
        }
    }

    async fn handle_awaiting_join(
        &mut self,
        msg: TransportMessage,
        realm: &Realm,
        fanouts: &FanoutRegistry,
        config: &TransportConfig,
    ) -> HandleOutcome {
        let TransportMessage::Join(payload) = msg else {
            return HandleOutcome::reply_and_close(error_frame(
                ErrorCode::InvalidFrame,
                "expected a join frame",
                None,
            ));
        };

        let Some(player) = resolve_player(&payload, config) else {
            return HandleOutcome::reply_and_close(join_failure(
                payload.request_id,
                "no playerId supplied and guest mode is disabled",
            ));
        };

        let encoding = payload.encoding.unwrap_or(Encoding::Json);
        let land_id = LandId::new(
            payload.land_type.clone(),
            payload.land_instance_id.clone().unwrap_or_default(),
        );

        let keeper = match realm.route(land_id).await {
            Ok(keeper) => keeper,
            Err(err) => return HandleOutcome::reply_and_close(join_failure(payload.request_id, err.to_string())),
        };
        let resolved_land_id = keeper.land_id().clone();

        let outcome = match keeper
            .join(
                self.session_id,
                self.client_id.clone(),
                player.clone(),
                payload.metadata.clone(),
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                return HandleOutcome::reply_and_close(join_failure(payload.request_id, err.to_string()))
            }
        };

        let Some(fanout) = fanouts.land(realm, &resolved_land_id).await else {
            return HandleOutcome::reply_and_close(join_failure(
                payload.request_id,
                "land terminated during join",
            ));
        };
        let subscribe = fanout.register(player.clone(), encoding).await;

        self.encoding = encoding;
        self.state = SessionState::Joined(JoinedState {
            player,
            keeper,
            fanout,
        });

        HandleOutcome {
            replies: vec![TransportMessage::JoinResponse(JoinResponsePayload {
                request_id: payload.request_id,
                success: true,
                land_type: Some(resolved_land_id.land_type().to_string()),
                land_instance_id: Some(resolved_land_id.instance_id().to_string()),
                land_id: Some(resolved_land_id.to_string()),
                player_slot: Some(outcome.slot.as_raw()),
                encoding: Some(encoding),
                path_table: None,
                reason: None,
            })],
            subscribe: Some(subscribe),
            close: false,
        }
    }

    async fn handle_joined(&mut self, joined: JoinedState, msg: TransportMessage) -> HandleOutcome {
        let reply = match msg {
            TransportMessage::Join(_) => Some(error_frame(
                ErrorCode::InvalidFrame,
                "already joined",
                None,
            )),
            TransportMessage::Action(action) => {
                let request_id = action.request_id.clone();
                match joined
                    .keeper
                    .action(
                        self.session_id,
                        self.client_id.clone(),
                        joined.player.clone(),
                        action,
                    )
                    .await
                {
                    Ok(response) => Some(TransportMessage::ActionResponse(ActionResponsePayload {
                        request_id,
                        response,
                    })),
                    Err(err) => Some(error_frame(err.code(), err.to_string(), Some(request_id))),
                }
            }
            TransportMessage::Event(event) => {
                if event.direction != EventDirection::FromClient {
                    Some(error_frame(
                        ErrorCode::InvalidFrame,
                        "clients may only send client-originated events",
                        None,
                    ))
                } else {
                    match joined
                        .keeper
                        .client_event(
                            self.session_id,
                            self.client_id.clone(),
                            joined.player.clone(),
                            event.event_type,
                            event.payload,
                        )
                        .await
                    {
                        Ok(()) => None,
                        Err(err) => Some(error_frame(err.code(), err.to_string(), None)),
                    }
                }
            }
            _ => Some(error_frame(
                ErrorCode::InvalidFrame,
                "unexpected frame for a joined session",
                None,
            )),
        };

        self.state = SessionState::Joined(joined);
        reply.map_or_else(HandleOutcome::nothing, HandleOutcome::reply)
    }
}

fn resolve_player(payload: &JoinPayload, config: &TransportConfig) -> Option<PlayerId> {
    if let Some(id) = &payload.player_id {
        return Some(PlayerId::new(id.clone()));
    }
    if config.allow_guest_mode {
        return Some((config.guest_factory)(payload));
    }
    None
}

fn error_frame(code: ErrorCode, message: impl Into<String>, request_id: Option<String>) -> TransportMessage {
    TransportMessage::Error(ErrorPayload {
        code,
        message: message.into(),
        details: None,
        request_id,
    })
}

fn join_failure(request_id: String, reason: impl Into<String>) -> TransportMessage {
    TransportMessage::JoinResponse(JoinResponsePayload {
        request_id,
        success: false,
        land_type: None,
        land_instance_id: None,
        land_id: None,
        player_slot: None,
        encoding: None,
        path_table: None,
        reason: Some(reason.into()),
    })
}

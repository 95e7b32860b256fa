// SPDX-License-Identifier: Apache-2.0
//! Per-Land fan-out: the adapter's per-Keeper list of joined sessions,
//! one distributor per live Land, which also merges same-tick events
//! into a MessagePack session's state-update frame (opcode 107).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use land_keeper::KeeperOutput;
use land_realm::Realm;
use land_state::{LandId, PlayerId};
use land_wire::{
    encode_merged, Encoding, EventDirection, EventPayload, StateUpdatePayload, TransportMessage,
};
use tokio::sync::{broadcast, mpsc, RwLock};

/// Per-session outbox capacity; sync frames are dropped rather than
/// grown past this under backpressure.
const OUTBOX_CAPACITY: usize = 256;

/// One item pushed into a joined session's outbound queue.
#[derive(Debug, Clone)]
pub enum OutboundItem {
    /// A frame to encode with the session's negotiated codec.
    Frame(TransportMessage),
    /// A pre-encoded MessagePack opcode-107 merged frame (state update
    /// plus same-tick events); only ever produced for MessagePack
    /// sessions.
    MergedMsgPack(Vec<u8>),
}

/// What a freshly joined session receives from [`LandFanout::register`]:
/// droppable sync/event traffic on `items`, and an unconditional close
/// signal on `close` that is never subject to the `items` channel's
/// backpressure.
pub struct SessionOutbox {
    /// Fan-out traffic for this session.
    pub items: mpsc::Receiver<OutboundItem>,
    /// Fires once: the session must close (Land terminated, or this
    /// session could not keep up with an undroppable frame).
    pub close: mpsc::UnboundedReceiver<()>,
}

struct SessionSink {
    encoding: Encoding,
    outbox: mpsc::Sender<OutboundItem>,
    close: mpsc::UnboundedSender<()>,
}

struct LandFanoutInner {
    land_id: LandId,
    roster: RwLock<BTreeSet<PlayerId>>,
    sessions: RwLock<HashMap<PlayerId, SessionSink>>,
}

/// Handle to one Land's live fan-out. Cheaply cloneable; every clone
/// shares the same joined-session registry.
#[derive(Clone)]
pub struct LandFanout(Arc<LandFanoutInner>);

impl LandFanout {
    /// Register a freshly joined session, returning the outbox it should
    /// forward to its transport connection.
    pub async fn register(&self, player: PlayerId, encoding: Encoding) -> SessionOutbox {
        let (items_tx, items_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let (close_tx, close_rx) = mpsc::unbounded_channel();
        self.0.roster.write().await.insert(player.clone());
        self.0.sessions.write().await.insert(
            player,
            SessionSink {
                encoding,
                outbox: items_tx,
                close: close_tx,
            },
        );
        SessionOutbox {
            items: items_rx,
            close: close_rx,
        }
    }

    /// Deregister a session on leave or disconnect.
    pub async fn unregister(&self, player: &PlayerId) {
        self.0.roster.write().await.remove(player);
        self.0.sessions.write().await.remove(player);
    }
}

/// Process-wide cache of live Lands' fan-outs, created lazily on first
/// join and torn down once the Land's distributor observes
/// [`KeeperOutput::Terminated`].
#[derive(Clone, Default)]
pub struct FanoutRegistry {
    inner: Arc<RwLock<HashMap<LandId, LandFanout>>>,
}

impl FanoutRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the fan-out for `land_id`, subscribing to the
    /// Realm's Keeper output the first time any session joins this Land.
    /// Returns `None` if the Land is not (or no longer) live.
    pub async fn land(&self, realm: &Realm, land_id: &LandId) -> Option<LandFanout> {
        if let Some(existing) = self.inner.read().await.get(land_id) {
            return Some(existing.clone());
        }
        let mut guard = self.inner.write().await;
        if let Some(existing) = guard.get(land_id) {
            return Some(existing.clone());
        }
        let receiver = realm.subscribe(land_id).await?;
        let fanout = LandFanout(Arc::new(LandFanoutInner {
            land_id: land_id.clone(),
            roster: RwLock::new(BTreeSet::new()),
            sessions: RwLock::new(HashMap::new()),
        }));
        guard.insert(land_id.clone(), fanout.clone());
        drop(guard);

        let distributed = fanout.clone();
        let registry = self.clone();
        let evict_land_id = land_id.clone();
        tokio::spawn(async move {
            run_distributor(&distributed, receiver).await;
            registry.inner.write().await.remove(&evict_land_id);
        });
        Some(fanout)
    }
}

async fn run_distributor(fanout: &LandFanout, mut output: broadcast::Receiver<KeeperOutput>) {
    loop {
        let first = match output.recv().await {
            Ok(item) => item,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    land_id = %fanout.0.land_id,
                    skipped,
                    "fan-out receiver lagged, some sync frames were skipped"
                );
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let terminated = matches!(first, KeeperOutput::Terminated);
        let mut batch = vec![first];
        while let Ok(next) = output.try_recv() {
            let is_terminated = matches!(next, KeeperOutput::Terminated);
            batch.push(next);
            if is_terminated {
                break;
            }
        }
        dispatch_batch(fanout, batch).await;
        if terminated {
            break;
        }
    }
    close_all(fanout).await;
}

/// One distributor pass: everything the Keeper produced since the last
/// pass, merged per player so a same-tick state update and its events can
/// be combined into one MessagePack frame.
async fn dispatch_batch(fanout: &LandFanout, batch: Vec<KeeperOutput>) {
    let roster: Vec<PlayerId> = fanout.0.roster.read().await.iter().cloned().collect();
    let mut updates: HashMap<PlayerId, StateUpdatePayload> = HashMap::new();
    let mut events: HashMap<PlayerId, Vec<EventPayload>> = HashMap::new();

    for item in batch {
        match item {
            KeeperOutput::StateUpdate { player, payload } => {
                updates.insert(player, payload);
            }
            KeeperOutput::ServerEvent {
                target,
                event_type,
                payload,
            } => {
                for player in target.resolve(roster.iter()) {
                    events.entry(player).or_default().push(EventPayload {
                        direction: EventDirection::FromServer,
                        event_type: event_type.clone(),
                        payload: payload.clone(),
                        raw_body: None,
                    });
                }
            }
            KeeperOutput::Terminated => {}
        }
    }

    let mut targets: BTreeSet<PlayerId> = updates.keys().cloned().collect();
    targets.extend(events.keys().cloned());

    for player in targets {
        let update = updates.remove(&player);
        let player_events = events.remove(&player).unwrap_or_default();
        deliver(fanout, &player, update, player_events).await;
    }
}

async fn deliver(
    fanout: &LandFanout,
    player: &PlayerId,
    update: Option<StateUpdatePayload>,
    events: Vec<EventPayload>,
) {
    let Some(encoding) = session_encoding(fanout, player).await else {
        return;
    };

    if encoding == Encoding::MessagePack {
        if let Some(update) = &update {
            if !events.is_empty() {
                let update_msg = TransportMessage::StateUpdate(update.clone());
                let event_msgs: Vec<_> = events.into_iter().map(TransportMessage::Event).collect();
                match encode_merged(&update_msg, &event_msgs) {
                    Ok(bytes) => send(fanout, player, OutboundItem::MergedMsgPack(bytes), true).await,
                    Err(err) => tracing::warn!(%err, "failed to encode merged msgpack frame"),
                }
                return;
            }
        }
    }

    if let Some(update) = update {
        send(
            fanout,
            player,
            OutboundItem::Frame(TransportMessage::StateUpdate(update)),
            true,
        )
        .await;
    }
    for event in events {
        send(
            fanout,
            player,
            OutboundItem::Frame(TransportMessage::Event(event)),
            false,
        )
        .await;
    }
}

async fn session_encoding(fanout: &LandFanout, player: &PlayerId) -> Option<Encoding> {
    fanout
        .0
        .sessions
        .read()
        .await
        .get(player)
        .map(|sink| sink.encoding)
}

/// `droppable` distinguishes sync frames (silently dropped under
/// backpressure) from events and merged frames, which must be delivered
/// or the session killed.
async fn send(fanout: &LandFanout, player: &PlayerId, item: OutboundItem, droppable: bool) {
    let full = {
        let sessions = fanout.0.sessions.read().await;
        let Some(sink) = sessions.get(player) else {
            return;
        };
        match sink.outbox.try_send(item) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => return,
            Err(mpsc::error::TrySendError::Full(_)) => true,
        }
    };
    if !full {
        return;
    }
    if droppable {
        tracing::debug!(%player, "dropped sync frame for a slow session");
        return;
    }
    tracing::warn!(%player, "session outbox full on an undroppable frame, closing session");
    let sessions = fanout.0.sessions.read().await;
    if let Some(sink) = sessions.get(player) {
        let _ = sink.close.send(());
    }
}

async fn close_all(fanout: &LandFanout) {
    for sink in fanout.0.sessions.write().await.values() {
        let _ = sink.close.send(());
    }
}

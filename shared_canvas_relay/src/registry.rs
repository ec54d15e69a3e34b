// Relay registry: the set of live peers, keyed by connection id.
//
// A `Peer` is the relay's handle on one connection: its id, the event kinds
// it is subscribed to (currently always all four), and the sending half of
// its outbound frame queue. The queue is drained by that connection's writer
// thread in `server.rs`, so pushing a frame never blocks on the socket.
//
// The queue is bounded at `OUTBOX_CAPACITY` frames. A peer that stops
// reading fills its socket buffer, then its queue, and from then on every
// send to it fails with `SendError::Full`; the session drops such a peer
// instead of buffering for it.
//
// Only the lifecycle manager mutates the registry (`register`/`unregister`
// are crate-private and called from `lifecycle.rs`). The dispatcher borrows
// it read-only to enumerate recipients.
//
// `BTreeMap` keeps iteration order deterministic (ascending id), which makes
// broadcast order reproducible in tests. Nothing depends on the order.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::mpsc::{SyncSender, TrySendError};

use shared_canvas_protocol::{ConnectionId, EventKind};

use crate::error::SendError;

/// One encoded envelope, shared by every recipient of a broadcast.
pub type Frame = Arc<[u8]>;

/// Frames a peer may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 4096;

/// A live connection handle.
pub struct Peer {
    id: ConnectionId,
    subscriptions: BTreeSet<EventKind>,
    outbox: SyncSender<Frame>,
}

impl Peer {
    /// A peer subscribed to every event kind.
    pub fn new(id: ConnectionId, outbox: SyncSender<Frame>) -> Self {
        Self {
            id,
            subscriptions: EventKind::ALL.into_iter().collect(),
            outbox,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.subscriptions.contains(&kind)
    }

    /// Queue a frame for this peer's writer thread. Never blocks.
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.outbox.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full(self.id),
            TrySendError::Disconnected(_) => SendError::Closed(self.id),
        })
    }
}

/// Process-wide mapping from connection id to peer.
#[derive(Default)]
pub struct Registry {
    peers: BTreeMap<ConnectionId, Peer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a peer. Returns false (and leaves the registry untouched) if
    /// the id is already registered.
    pub(crate) fn register(&mut self, peer: Peer) -> bool {
        if self.peers.contains_key(&peer.id) {
            return false;
        }
        self.peers.insert(peer.id, peer);
        true
    }

    pub(crate) fn unregister(&mut self, id: ConnectionId) -> Option<Peer> {
        self.peers.remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.peers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Every registered peer except `excluded`.
    pub fn peers_except(&self, excluded: ConnectionId) -> impl Iterator<Item = &Peer> {
        self.peers.values().filter(move |peer| peer.id != excluded)
    }
}

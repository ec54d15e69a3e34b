// Connection lifecycle manager.
//
// Per-connection state machine: Connecting -> Connected -> Disconnected.
//
// - `accept` hands out a fresh `ConnectionId` in the Connecting state.
// - `connect` registers the peer and then asks the dispatcher to replay the
//   canvas to it. Both happen in one call on the single relay loop, so no
//   live event can be queued for the peer ahead of its replay.
// - `disconnect` on a Connected peer synthesizes a stamped remove-pointer
//   event, routes it through the classifier stamping path and the
//   dispatcher, and only then unregisters the peer. It runs the same way for
//   graceful and abrupt closes; the transport reports both identically.
// - `drop_failed` disconnects peers a broadcast could not reach (writer gone
//   or queue full). Their own remove-pointer broadcasts can fail on further
//   peers, so removal works through a queue until nothing new fails.
//
// The manager owns the registry. Ids are monotonic and never reused, so an
// id below `next_id` that is neither pending nor registered is Disconnected
// without keeping a record of every departed connection. Once every `u32`
// has been handed out, `accept` refuses further connections.

use std::collections::BTreeSet;
use std::sync::mpsc::SyncSender;

use shared_canvas_protocol::{ClientEvent, ConnectionId};
use tracing::{info, warn};

use crate::classifier;
use crate::dispatcher::{BroadcastReport, Dispatcher};
use crate::error::LifecycleError;
use crate::registry::{Frame, Peer, Registry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Default)]
pub struct Lifecycle {
    registry: Registry,
    connecting: BTreeSet<ConnectionId>,
    /// One past the last id handed out. Wider than the id so that handing
    /// out `u32::MAX` itself does not overflow.
    next_id: u64,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Allocate an id for a new transport connection.
    pub fn accept(&mut self) -> Result<ConnectionId, LifecycleError> {
        let raw = u32::try_from(self.next_id).map_err(|_| LifecycleError::IdsExhausted)?;
        let id = ConnectionId(raw);
        self.next_id += 1;
        self.connecting.insert(id);
        Ok(id)
    }

    /// Current state of `id`, or `None` if it was never accepted.
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        if self.connecting.contains(&id) {
            Some(ConnectionState::Connecting)
        } else if self.registry.contains(id) {
            Some(ConnectionState::Connected)
        } else if u64::from(id.0) < self.next_id {
            Some(ConnectionState::Disconnected)
        } else {
            None
        }
    }

    /// Connecting -> Connected: register the peer, then replay the canvas
    /// to it.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        outbox: SyncSender<Frame>,
        dispatcher: &Dispatcher,
    ) -> Result<(), LifecycleError> {
        if !self.connecting.remove(&id) {
            return Err(LifecycleError::NotConnecting(id));
        }
        self.registry.register(Peer::new(id, outbox));
        info!(peer = %id, peers = self.registry.len(), "peer connected");
        dispatcher.replay_to(&self.registry, id);
        Ok(())
    }

    /// Move `id` to Disconnected. A Connected peer gets its pointer removed
    /// on every other peer before it leaves the registry. Returns false if
    /// `id` was already Disconnected or never accepted.
    pub fn disconnect(&mut self, id: ConnectionId, dispatcher: &mut Dispatcher) -> bool {
        if self.connecting.remove(&id) {
            info!(peer = %id, "connection closed before registration");
            return true;
        }
        if !self.registry.contains(id) {
            return false;
        }
        self.remove_all(vec![id], dispatcher);
        true
    }

    /// Disconnect every peer a broadcast failed to reach.
    pub fn drop_failed(&mut self, report: &BroadcastReport, dispatcher: &mut Dispatcher) {
        if report.failed.is_empty() {
            return;
        }
        for id in &report.failed {
            warn!(peer = %id, "dropping unreachable peer");
        }
        self.remove_all(report.failed.clone(), dispatcher);
    }

    fn remove_all(&mut self, mut pending: Vec<ConnectionId>, dispatcher: &mut Dispatcher) {
        while let Some(id) = pending.pop() {
            if !self.registry.contains(id) {
                continue;
            }
            match classifier::stamp(&ClientEvent::RemovePointer, id) {
                Ok(event) => {
                    let report = dispatcher.broadcast(&self.registry, id, &event);
                    pending.extend(report.failed);
                }
                Err(e) => warn!(peer = %id, error = %e, "could not build remove-pointer event"),
            }
            self.registry.unregister(id);
            info!(peer = %id, peers = self.registry.len(), "peer disconnected");
        }
    }
}

// Relay dispatcher: fan-out broadcast and join-time replay.
//
// The dispatcher owns the canvas replay buffer and borrows the registry for
// each call; it never adds or removes peers. A broadcast encodes the event
// envelope once and queues the same `Frame` for every registered peer other
// than the originator. Queuing never blocks.
//
// A send fails with `SendError` when a peer's writer has gone away or its
// bounded queue is full. The failure is logged and listed in the
// `BroadcastReport` but never stops delivery to the remaining peers. The
// session drops every listed peer through the lifecycle manager.
//
// Every broadcast event is folded into the canvas buffer afterwards. The
// buffer itself ignores transient (pointer) kinds.
//
// Every frame must fit in `MAX_FRAME_SIZE`. A replay that would not fit
// loses its oldest strokes (the clear marker always stays) until it does.

use std::sync::Arc;

use shared_canvas_protocol::framing::MAX_FRAME_SIZE;
use shared_canvas_protocol::{ConnectionId, Envelope, ServerEvent, ServerMessage};
use tracing::{debug, error, warn};

use crate::canvas::CanvasState;
use crate::registry::{Frame, Registry};

/// Bytes of a replay frame taken by the outer envelope and array brackets.
const REPLAY_ENVELOPE_OVERHEAD: usize = 64;

/// Result of one broadcast call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers whose outbound queue accepted the frame.
    pub delivered: usize,
    /// Peers whose outbound queue was closed or full.
    pub failed: Vec<ConnectionId>,
}

pub struct Dispatcher {
    canvas: CanvasState,
}

impl Dispatcher {
    pub fn new(max_replay_strokes: usize) -> Self {
        Self {
            canvas: CanvasState::new(max_replay_strokes),
        }
    }

    pub fn canvas(&self) -> &CanvasState {
        &self.canvas
    }

    /// Send `event` to every registered peer except `origin`, then fold it
    /// into the replay buffer. An event that cannot be framed is neither
    /// sent nor folded.
    pub fn broadcast(
        &mut self,
        registry: &Registry,
        origin: ConnectionId,
        event: &ServerEvent,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let Some(frame) = encode(&ServerMessage::Event(event.clone())) else {
            return report;
        };
        let kind = event.kind();
        for peer in registry
            .peers_except(origin)
            .filter(|peer| peer.is_subscribed(kind))
        {
            match peer.send(Arc::clone(&frame)) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    debug!(peer = %peer.id(), error = %e, "frame not queued");
                    report.failed.push(peer.id());
                }
            }
        }
        debug!(
            event = event.name(),
            origin = %origin,
            delivered = report.delivered,
            "broadcast"
        );
        self.canvas.fold(event);
        report
    }

    /// Push the accumulated canvas state to `id` alone, as one frame.
    /// Returns false without sending anything if there is no state yet, `id`
    /// is not registered, or the frame could not be queued.
    pub fn replay_to(&self, registry: &Registry, id: ConnectionId) -> bool {
        if self.canvas.is_empty() {
            return false;
        }
        let Some(peer) = registry.get(id) else {
            return false;
        };
        let mut events = self.canvas.replay_events();
        let trimmed = fit_replay(&mut events);
        if trimmed > 0 {
            warn!(peer = %id, trimmed, "replay trimmed to fit one frame");
        }
        if events.is_empty() {
            return false;
        }
        let count = events.len();
        let Some(frame) = encode(&ServerMessage::Replay(events)) else {
            return false;
        };
        match peer.send(frame) {
            Ok(()) => {
                debug!(
                    peer = %id,
                    events = count,
                    evicted = self.canvas.evicted(),
                    "replayed canvas"
                );
                true
            }
            Err(e) => {
                debug!(peer = %id, error = %e, "replay not delivered");
                false
            }
        }
    }
}

/// Drop the oldest strokes from `events` until its replay envelope fits in
/// one frame. A leading clear marker is kept. Returns the number dropped.
fn fit_replay(events: &mut Vec<ServerEvent>) -> usize {
    let budget = (MAX_FRAME_SIZE as usize).saturating_sub(REPLAY_ENVELOPE_OVERHEAD);
    // Each element costs its encoded envelope plus a separating comma.
    let sizes: Vec<usize> = events.iter().map(|event| encoded_len(event) + 1).collect();
    let mut total: usize = sizes.iter().sum();
    let keep_from = usize::from(matches!(events.first(), Some(ServerEvent::ClearScreen)));
    let mut cut = keep_from;
    while total > budget && cut < events.len() {
        total -= sizes[cut];
        cut += 1;
    }
    events.drain(keep_from..cut);
    cut - keep_from
}

fn encoded_len(event: &ServerEvent) -> usize {
    serde_json::to_vec(&Envelope::from_server_event(event)).map_or(0, |bytes| bytes.len())
}

/// Serialize a message envelope into a shareable frame. `None` if encoding
/// fails or the result is larger than a frame may be.
fn encode(message: &ServerMessage) -> Option<Frame> {
    match serde_json::to_vec(&message.to_envelope()) {
        Ok(bytes) if bytes.len() > MAX_FRAME_SIZE as usize => {
            warn!(event = message.name(), bytes = bytes.len(), "envelope exceeds frame limit");
            None
        }
        Ok(bytes) => Some(Frame::from(bytes)),
        Err(e) => {
            error!(event = message.name(), error = %e, "failed to encode envelope");
            None
        }
    }
}

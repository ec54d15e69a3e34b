// Envelope and relay-to-peer message types.
//
// Every frame on the wire carries one `Envelope`: a wire event name plus a
// plain JSON payload, i.e. `{"event": "...", "data": {...}}`. The relay
// looks at `event` to pick a handler and hands `data` to the matching
// `from_serializable_object`.
//
// `ServerMessage` is everything a peer can receive from the relay: a live
// rebroadcast (`Event`) or the one-time join replay (`Replay`). The replay
// payload nests envelopes, `{"events": [{"event": ..., "data": ...}, ...]}`,
// so a peer applies replayed events with the same dispatch code it uses for
// live ones.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::EventError;
use crate::event::{ClientEvent, EventKind, ServerEvent};

/// Wire name of the join-time replay push.
pub const REPLAY_EVENT_NAME: &str = "server_replay_event";

/// One wire message: event name plus plain payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Envelope for a peer -> relay event.
    pub fn from_client_event(event: &ClientEvent) -> Self {
        Self::new(event.name(), event.to_serializable_object())
    }

    /// Envelope for a relay -> peer event.
    pub fn from_server_event(event: &ServerEvent) -> Self {
        Self::new(event.name(), event.to_serializable_object())
    }
}

/// A message delivered from the relay to a peer.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerMessage {
    /// A live rebroadcast of another peer's event.
    Event(ServerEvent),
    /// Accumulated canvas state, sent once right after joining.
    Replay(Vec<ServerEvent>),
}

impl ServerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::Event(event) => event.name(),
            ServerMessage::Replay(_) => REPLAY_EVENT_NAME,
        }
    }

    pub fn to_envelope(&self) -> Envelope {
        match self {
            ServerMessage::Event(event) => Envelope::from_server_event(event),
            ServerMessage::Replay(events) => {
                let nested: Vec<Envelope> = events.iter().map(Envelope::from_server_event).collect();
                Envelope::new(REPLAY_EVENT_NAME, json!({ "events": nested }))
            }
        }
    }

    /// Decode a received envelope. Unknown event names give `Ok(None)` so
    /// older peers tolerate newer relays.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, EventError> {
        if envelope.event == REPLAY_EVENT_NAME {
            let payload = ReplayPayload::deserialize(&envelope.data).map_err(|source| {
                EventError::Malformed {
                    event: REPLAY_EVENT_NAME,
                    source,
                }
            })?;
            let mut events = Vec::with_capacity(payload.events.len());
            for nested in &payload.events {
                if let Some(kind) = EventKind::from_server_name(&nested.event) {
                    events.push(ServerEvent::from_serializable_object(kind, &nested.data)?);
                }
            }
            return Ok(Some(ServerMessage::Replay(events)));
        }

        match EventKind::from_server_name(&envelope.event) {
            Some(kind) => Ok(Some(ServerMessage::Event(
                ServerEvent::from_serializable_object(kind, &envelope.data)?,
            ))),
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
struct ReplayPayload {
    events: Vec<Envelope>,
}

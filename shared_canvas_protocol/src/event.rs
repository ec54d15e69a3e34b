// Canvas event taxonomy: client-originated and server-originated events.
//
// Four kinds of event exist, captured by the closed `EventKind` enum:
// - Pointer:       a peer's pointer position. Stamped with the sender's id.
// - RemovePointer: a peer's pointer left the canvas (or the peer left).
//                  Stamped with the sender's id.
// - Draw:          one stroke segment. Relayed anonymously.
// - ClearScreen:   wipe the canvas. Relayed anonymously.
//
// Each kind has a client wire name (peer -> relay) and a server wire name
// (relay -> peers). The two namespaces never overlap, so a client that
// echoes what it receives can never be mistaken for an original sender.
//
// `ClientEvent` is what a peer sends; `ServerEvent` is what the relay
// rebroadcasts. The conversion `ClientEvent::to_server_event` is where origin
// stamping happens. Only the stamped server variants have an `origin_id`
// field at all, so an unstamped event cannot leak a sender identity even by
// accident.
//
// Payloads are plain JSON objects with camelCase keys (see the `*Payload`
// helper structs at the bottom). Decoding goes through serde so a missing
// field or a string where a number belongs surfaces as
// `EventError::Malformed`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::EventError;
use crate::types::ConnectionId;

/// The closed set of canvas event kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Pointer,
    RemovePointer,
    Draw,
    ClearScreen,
}

impl EventKind {
    /// Every kind, in wire-table order.
    pub const ALL: [EventKind; 4] = [
        EventKind::Pointer,
        EventKind::RemovePointer,
        EventKind::Draw,
        EventKind::ClearScreen,
    ];

    /// Name used when a peer sends this kind to the relay.
    pub const fn client_name(self) -> &'static str {
        match self {
            EventKind::Pointer => "client_pointer_event",
            EventKind::RemovePointer => "client_remove_pointer_event",
            EventKind::Draw => "client_draw_event",
            EventKind::ClearScreen => "client_clear_screen_event",
        }
    }

    /// Name used when the relay rebroadcasts this kind to peers.
    pub const fn server_name(self) -> &'static str {
        match self {
            EventKind::Pointer => "server_pointer_event",
            EventKind::RemovePointer => "server_remove_pointer_event",
            EventKind::Draw => "server_draw_event",
            EventKind::ClearScreen => "server_clear_screen_event",
        }
    }

    /// Whether the rebroadcast must carry the sender's connection id.
    pub const fn needs_origin_stamp(self) -> bool {
        match self {
            EventKind::Pointer | EventKind::RemovePointer => true,
            EventKind::Draw | EventKind::ClearScreen => false,
        }
    }

    pub fn from_client_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.client_name() == name)
    }

    pub fn from_server_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.server_name() == name)
    }
}

/// A pointer position in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: f64,
    pub y: f64,
}

/// One stroke segment: a line from `(from_x, from_y)` to `(to_x, to_y)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawStroke {
    pub from_x: f64,
    pub from_y: f64,
    pub to_x: f64,
    pub to_y: f64,
    pub color: String,
    pub width: f64,
}

/// An event as sent by a peer to the relay.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Pointer(PointerPosition),
    RemovePointer,
    Draw(DrawStroke),
    ClearScreen,
}

impl ClientEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Pointer(_) => EventKind::Pointer,
            ClientEvent::RemovePointer => EventKind::RemovePointer,
            ClientEvent::Draw(_) => EventKind::Draw,
            ClientEvent::ClearScreen => EventKind::ClearScreen,
        }
    }

    /// Client wire name for this event.
    pub fn name(&self) -> &'static str {
        self.kind().client_name()
    }

    /// Build an event of `kind` from its plain JSON payload.
    ///
    /// Payload-less kinds accept any `data` (including `null`) and ignore it.
    /// Extra keys are ignored for every kind.
    pub fn from_serializable_object(kind: EventKind, data: &Value) -> Result<Self, EventError> {
        let event = kind.client_name();
        Ok(match kind {
            EventKind::Pointer => ClientEvent::Pointer(decode(event, data)?),
            EventKind::RemovePointer => ClientEvent::RemovePointer,
            EventKind::Draw => ClientEvent::Draw(decode(event, data)?),
            EventKind::ClearScreen => ClientEvent::ClearScreen,
        })
    }

    /// Plain JSON payload for sending this event to the relay.
    pub fn to_serializable_object(&self) -> Value {
        match self {
            ClientEvent::Pointer(position) => pointer_object(None, position),
            ClientEvent::RemovePointer | ClientEvent::ClearScreen => json!({}),
            ClientEvent::Draw(stroke) => stroke_object(stroke),
        }
    }

    /// Convert to the matching server event.
    ///
    /// Stamped kinds take `origin_id` as the sender identity and fail with
    /// `MissingOrigin` without one. Unstamped kinds discard it.
    pub fn to_server_event(&self, origin_id: Option<ConnectionId>) -> Result<ServerEvent, EventError> {
        let require_origin = || {
            origin_id.ok_or(EventError::MissingOrigin {
                event: self.name(),
            })
        };
        Ok(match self {
            ClientEvent::Pointer(position) => ServerEvent::Pointer {
                origin_id: require_origin()?,
                position: *position,
            },
            ClientEvent::RemovePointer => ServerEvent::RemovePointer {
                origin_id: require_origin()?,
            },
            ClientEvent::Draw(stroke) => ServerEvent::Draw(stroke.clone()),
            ClientEvent::ClearScreen => ServerEvent::ClearScreen,
        })
    }
}

/// An event as rebroadcast by the relay to peers.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    Pointer {
        origin_id: ConnectionId,
        position: PointerPosition,
    },
    RemovePointer {
        origin_id: ConnectionId,
    },
    Draw(DrawStroke),
    ClearScreen,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ServerEvent::Pointer { .. } => EventKind::Pointer,
            ServerEvent::RemovePointer { .. } => EventKind::RemovePointer,
            ServerEvent::Draw(_) => EventKind::Draw,
            ServerEvent::ClearScreen => EventKind::ClearScreen,
        }
    }

    /// Server wire name; the dispatch key on the receiving peer.
    pub fn name(&self) -> &'static str {
        self.kind().server_name()
    }

    /// The stamped sender identity, if this variant carries one.
    pub fn origin_id(&self) -> Option<ConnectionId> {
        match self {
            ServerEvent::Pointer { origin_id, .. } | ServerEvent::RemovePointer { origin_id } => {
                Some(*origin_id)
            }
            ServerEvent::Draw(_) | ServerEvent::ClearScreen => None,
        }
    }

    /// Plain JSON payload. Contains `originId` only for stamped variants.
    pub fn to_serializable_object(&self) -> Value {
        match self {
            ServerEvent::Pointer {
                origin_id,
                position,
            } => pointer_object(Some(*origin_id), position),
            ServerEvent::RemovePointer { origin_id } => json!({ "originId": origin_id.0 }),
            ServerEvent::Draw(stroke) => stroke_object(stroke),
            ServerEvent::ClearScreen => json!({}),
        }
    }

    /// Client-side decoding of a payload received under `kind`'s server name.
    pub fn from_serializable_object(kind: EventKind, data: &Value) -> Result<Self, EventError> {
        let event = kind.server_name();
        Ok(match kind {
            EventKind::Pointer => {
                let payload: StampedPointerPayload = decode(event, data)?;
                ServerEvent::Pointer {
                    origin_id: payload.origin_id,
                    position: PointerPosition {
                        x: payload.x,
                        y: payload.y,
                    },
                }
            }
            EventKind::RemovePointer => {
                let payload: StampedPayload = decode(event, data)?;
                ServerEvent::RemovePointer {
                    origin_id: payload.origin_id,
                }
            }
            EventKind::Draw => ServerEvent::Draw(decode(event, data)?),
            EventKind::ClearScreen => ServerEvent::ClearScreen,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StampedPointerPayload {
    origin_id: ConnectionId,
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StampedPayload {
    origin_id: ConnectionId,
}

fn decode<T: DeserializeOwned>(event: &'static str, data: &Value) -> Result<T, EventError> {
    T::deserialize(data).map_err(|source| EventError::Malformed { event, source })
}

fn pointer_object(origin_id: Option<ConnectionId>, position: &PointerPosition) -> Value {
    match origin_id {
        Some(id) => json!({ "originId": id.0, "x": position.x, "y": position.y }),
        None => json!({ "x": position.x, "y": position.y }),
    }
}

fn stroke_object(stroke: &DrawStroke) -> Value {
    json!({
        "fromX": stroke.from_x,
        "fromY": stroke.from_y,
        "toX": stroke.to_x,
        "toY": stroke.to_y,
        "color": stroke.color,
        "width": stroke.width,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn sample_stroke() -> DrawStroke {
        DrawStroke {
            from_x: 0.0,
            from_y: 0.0,
            to_x: 10.0,
            to_y: 10.0,
            color: "#000".into(),
            width: 2.0,
        }
    }

    #[test]
    fn wire_names_are_distinct_and_never_collide() {
        let mut seen = HashSet::new();
        for kind in EventKind::ALL {
            assert!(seen.insert(kind.client_name()), "{kind:?} client name reused");
            assert!(seen.insert(kind.server_name()), "{kind:?} server name reused");
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn names_map_back_to_kinds() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_client_name(kind.client_name()), Some(kind));
            assert_eq!(EventKind::from_server_name(kind.server_name()), Some(kind));
            // A server name is not a valid client name.
            assert_eq!(EventKind::from_client_name(kind.server_name()), None);
        }
        assert_eq!(EventKind::from_client_name("client_chat_event"), None);
    }

    #[test]
    fn only_pointer_kinds_need_stamping() {
        assert!(EventKind::Pointer.needs_origin_stamp());
        assert!(EventKind::RemovePointer.needs_origin_stamp());
        assert!(!EventKind::Draw.needs_origin_stamp());
        assert!(!EventKind::ClearScreen.needs_origin_stamp());
    }

    #[test]
    fn pointer_reads_coordinates() {
        let event =
            ClientEvent::from_serializable_object(EventKind::Pointer, &json!({"x": 5, "y": 7.5}))
                .unwrap();
        assert_eq!(event, ClientEvent::Pointer(PointerPosition { x: 5.0, y: 7.5 }));
    }

    #[test]
    fn pointer_missing_y_is_malformed() {
        let err = ClientEvent::from_serializable_object(EventKind::Pointer, &json!({"x": 5}))
            .unwrap_err();
        match err {
            EventError::Malformed { event, .. } => assert_eq!(event, "client_pointer_event"),
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn non_numeric_coordinates_are_malformed() {
        let result =
            ClientEvent::from_serializable_object(EventKind::Pointer, &json!({"x": "5", "y": 5}));
        assert!(matches!(result, Err(EventError::Malformed { .. })));

        let result = ClientEvent::from_serializable_object(
            EventKind::Draw,
            &json!({"fromX": 0, "fromY": 0, "toX": 1, "toY": 1, "color": "#fff", "width": "thick"}),
        );
        assert!(matches!(result, Err(EventError::Malformed { .. })));
    }

    #[test]
    fn draw_reads_camel_case_fields() {
        let data = json!({
            "fromX": 0, "fromY": 0, "toX": 10, "toY": 10,
            "color": "#000", "width": 2, "pressure": 0.5
        });
        let event = ClientEvent::from_serializable_object(EventKind::Draw, &data).unwrap();
        assert_eq!(event, ClientEvent::Draw(sample_stroke()));
    }

    #[test]
    fn payload_less_kinds_ignore_data() {
        for data in [Value::Null, json!({}), json!({"junk": true})] {
            assert_eq!(
                ClientEvent::from_serializable_object(EventKind::ClearScreen, &data).unwrap(),
                ClientEvent::ClearScreen
            );
            assert_eq!(
                ClientEvent::from_serializable_object(EventKind::RemovePointer, &data).unwrap(),
                ClientEvent::RemovePointer
            );
        }
    }

    #[test]
    fn stamped_kinds_require_origin() {
        let pointer = ClientEvent::Pointer(PointerPosition { x: 1.0, y: 2.0 });
        assert!(matches!(
            pointer.to_server_event(None),
            Err(EventError::MissingOrigin {
                event: "client_pointer_event"
            })
        ));
        assert!(matches!(
            ClientEvent::RemovePointer.to_server_event(None),
            Err(EventError::MissingOrigin { .. })
        ));

        let stamped = pointer.to_server_event(Some(ConnectionId(3))).unwrap();
        assert_eq!(stamped.origin_id(), Some(ConnectionId(3)));
        assert_eq!(
            stamped.to_serializable_object(),
            json!({"originId": 3, "x": 1.0, "y": 2.0})
        );
    }

    #[test]
    fn unstamped_kinds_never_carry_origin() {
        let draw = ClientEvent::Draw(sample_stroke())
            .to_server_event(Some(ConnectionId(9)))
            .unwrap();
        assert_eq!(draw.origin_id(), None);
        assert!(draw.to_serializable_object().get("originId").is_none());

        let clear = ClientEvent::ClearScreen.to_server_event(None).unwrap();
        assert_eq!(clear.origin_id(), None);
        assert_eq!(clear.to_serializable_object(), json!({}));
    }

    #[test]
    fn receiving_side_reconstructs_relayed_events() {
        let origin = Some(ConnectionId(4));
        let sent = [
            ClientEvent::Pointer(PointerPosition { x: 5.0, y: 5.0 }),
            ClientEvent::RemovePointer,
            ClientEvent::Draw(sample_stroke()),
            ClientEvent::ClearScreen,
        ];
        for client_event in sent {
            // Peer -> relay.
            let decoded = ClientEvent::from_serializable_object(
                client_event.kind(),
                &client_event.to_serializable_object(),
            )
            .unwrap();
            assert_eq!(decoded, client_event);

            // Relay -> peer.
            let server_event = decoded.to_server_event(origin).unwrap();
            let received = ServerEvent::from_serializable_object(
                server_event.kind(),
                &server_event.to_serializable_object(),
            )
            .unwrap();
            assert_eq!(received, server_event);
        }
    }

    #[test]
    fn server_pointer_without_origin_is_malformed_on_receipt() {
        let result =
            ServerEvent::from_serializable_object(EventKind::Pointer, &json!({"x": 1, "y": 1}));
        assert!(matches!(
            result,
            Err(EventError::Malformed {
                event: "server_pointer_event",
                ..
            })
        ));
    }
}

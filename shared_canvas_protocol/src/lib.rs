// shared_canvas_protocol: wire protocol for the shared canvas relay.
//
// This crate defines the event taxonomy, envelopes, and framing spoken
// between drawing clients and the relay (`shared_canvas_relay`). It is shared
// by both sides and has no threads, sockets, or relay state.
//
// Module overview:
// - `types.rs`:    `ConnectionId`, the relay-assigned peer identity.
// - `event.rs`:    `EventKind`, `ClientEvent`, `ServerEvent`, and the payload
//                  structs (`PointerPosition`, `DrawStroke`). Origin stamping
//                  happens in `ClientEvent::to_server_event`.
// - `message.rs`:  The `{"event", "data"}` `Envelope` and `ServerMessage`
//                  (live event or join replay) as seen by a receiving peer.
// - `framing.rs`:  4-byte big-endian length prefix + JSON payload over any
//                  `Read`/`Write` stream.
// - `error.rs`:    `EventError` (malformed payload, missing origin).
//
// Design decisions:
// - **Closed event set.** Wire names map to `EventKind` by exhaustive match,
//   so adding a kind is a compile error everywhere it must be handled.
//   Unknown names decode to `None`, never an error.
// - **Separate namespaces.** Client names are `client_*`, server names are
//   `server_*`; a peer can never receive its own event name back.
// - **No async runtime.** Framing works on `std::io`, matching the relay's
//   thread-per-connection transport.

pub mod error;
pub mod event;
pub mod framing;
pub mod message;
pub mod types;

pub use error::EventError;
pub use event::{ClientEvent, DrawStroke, EventKind, PointerPosition, ServerEvent};
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{Envelope, REPLAY_EVENT_NAME, ServerMessage};
pub use types::ConnectionId;

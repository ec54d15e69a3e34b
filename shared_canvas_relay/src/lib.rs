// shared_canvas_relay: event relay for a multi-user shared drawing canvas.
//
// Every connected peer emits pointer, stroke, and clear events; the relay
// rebroadcasts each one to every other peer so all participants see the same
// canvas. It never renders anything and keeps only enough history (strokes
// since the last clear) to bring late joiners up to date.
//
// Module overview, leaves first:
// - `registry.rs`:   `Peer` and `Registry`, the live connection set. Each peer
//                    owns the sending half of its bounded outbound queue.
// - `canvas.rs`:     `CanvasState`, the replay buffer folded from relayed
//                    draw and clear events.
// - `classifier.rs`: `ROUTES` registration table; wire name -> `ClientEvent`,
//                    and origin stamping for pointer kinds.
// - `dispatcher.rs`: `Dispatcher`; broadcast-to-all-but-sender and the
//                    join-time `replay_to`.
// - `lifecycle.rs`:  `Lifecycle`; Connecting -> Connected -> Disconnected,
//                    registration, replay, and remove-pointer cleanup.
// - `session.rs`:    `Session`, which wires the above together for the loop.
// - `server.rs`:     TCP listener, reader/writer threads, and the single
//                    main loop that owns the `Session`.
// - `client.rs`:     Blocking `CanvasClient` for tests and demos.
// - `error.rs`:      `RelayError`, `LifecycleError`, `SendError`, `ClientError`.
//
// Dependencies: `shared_canvas_protocol` (event types, envelopes, framing).
//
// The relay can run as a standalone binary (`main.rs`) or be embedded via the
// library API (`start_relay`).

pub mod canvas;
pub mod classifier;
pub mod client;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod server;
pub mod session;

pub use error::{ClientError, LifecycleError, RelayError, SendError};
pub use server::{RelayConfig, RelayHandle, start_relay};
pub use session::Session;

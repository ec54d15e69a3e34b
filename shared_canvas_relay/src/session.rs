// Session state for the canvas relay.
//
// `Session` is the central data structure that `server.rs` drives. It pairs
// the lifecycle manager (which owns the peer registry) with the dispatcher
// (which owns the canvas replay buffer) and routes every inbound event
// through classifier -> stamping -> broadcast. All mutation happens through
// methods called from the server's single-threaded main loop, so there is no
// internal locking.
//
// Outcomes of `handle_event`:
// - `Ok(Some(report))`: relayed; `report` says who got it. Peers listed in
//   `report.failed` have already been disconnected.
// - `Ok(None)`: ignored (unknown event name, or sender not Connected).
// - `Err(_)`: dropped (malformed payload or stamping failure). Nothing was
//   broadcast and the canvas is unchanged. The caller logs it.

use std::sync::mpsc::SyncSender;

use serde_json::Value;
use shared_canvas_protocol::{ConnectionId, EventError};
use tracing::debug;

use crate::canvas::CanvasState;
use crate::classifier;
use crate::dispatcher::{BroadcastReport, Dispatcher};
use crate::error::LifecycleError;
use crate::lifecycle::{ConnectionState, Lifecycle};
use crate::registry::Frame;

/// Relay session for one shared canvas.
pub struct Session {
    lifecycle: Lifecycle,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(max_replay_strokes: usize) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            dispatcher: Dispatcher::new(max_replay_strokes),
        }
    }

    /// Allocate an id for a newly accepted transport connection.
    pub fn accept(&mut self) -> Result<ConnectionId, LifecycleError> {
        self.lifecycle.accept()
    }

    /// Register `id` with its outbound queue and replay the canvas to it.
    pub fn connect(
        &mut self,
        id: ConnectionId,
        outbox: SyncSender<Frame>,
    ) -> Result<(), LifecycleError> {
        self.lifecycle.connect(id, outbox, &self.dispatcher)
    }

    /// Classify, stamp, and broadcast one raw event from `sender`.
    pub fn handle_event(
        &mut self,
        sender: ConnectionId,
        name: &str,
        data: &Value,
    ) -> Result<Option<BroadcastReport>, EventError> {
        if self.lifecycle.state(sender) != Some(ConnectionState::Connected) {
            debug!(peer = %sender, event = name, "ignoring event from unregistered connection");
            return Ok(None);
        }
        let Some(client_event) = classifier::classify(name, data)? else {
            debug!(peer = %sender, event = name, "ignoring unknown event");
            return Ok(None);
        };
        let server_event = classifier::stamp(&client_event, sender)?;
        let report = self
            .dispatcher
            .broadcast(self.lifecycle.registry(), sender, &server_event);
        self.lifecycle.drop_failed(&report, &mut self.dispatcher);
        Ok(Some(report))
    }

    /// Tear down `id`. Returns false if it was already gone.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        self.lifecycle.disconnect(id, &mut self.dispatcher)
    }

    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lifecycle.state(id)
    }

    pub fn peer_count(&self) -> usize {
        self.lifecycle.registry().len()
    }

    pub fn canvas(&self) -> &CanvasState {
        self.dispatcher.canvas()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::{self, Receiver};

    use serde_json::json;
    use shared_canvas_protocol::{DrawStroke, Envelope, PointerPosition, ServerEvent, ServerMessage};

    use super::*;
    use crate::registry::OUTBOX_CAPACITY;

    /// A connected test peer: its id and the receiving end of its outbox.
    struct TestPeer {
        id: ConnectionId,
        inbox: Receiver<Frame>,
    }

    impl TestPeer {
        fn join(session: &mut Session) -> Self {
            Self::join_with_capacity(session, OUTBOX_CAPACITY)
        }

        fn join_with_capacity(session: &mut Session, capacity: usize) -> Self {
            let id = session.accept().unwrap();
            let (tx, inbox) = mpsc::sync_channel(capacity);
            session.connect(id, tx).unwrap();
            Self { id, inbox }
        }

        fn received(&self) -> Vec<ServerMessage> {
            self.inbox
                .try_iter()
                .map(|frame| {
                    let envelope: Envelope = serde_json::from_slice(&frame).unwrap();
                    ServerMessage::from_envelope(&envelope).unwrap().unwrap()
                })
                .collect()
        }
    }

    fn draw_payload() -> Value {
        json!({"fromX": 0, "fromY": 0, "toX": 10, "toY": 10, "color": "#000", "width": 2})
    }

    fn drawn_stroke() -> DrawStroke {
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
    fn draw_reaches_everyone_but_the_sender() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);
        let c = TestPeer::join(&mut session);

        let report = session
            .handle_event(a.id, "client_draw_event", &draw_payload())
            .unwrap()
            .unwrap();
        assert_eq!(report.delivered, 2);

        let expected = vec![ServerMessage::Event(ServerEvent::Draw(drawn_stroke()))];
        assert_eq!(b.received(), expected);
        assert_eq!(c.received(), expected);
        assert!(a.received().is_empty());
    }

    #[test]
    fn pointer_is_stamped_with_sender() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);
        let c = TestPeer::join(&mut session);

        session
            .handle_event(a.id, "client_pointer_event", &json!({"x": 5, "y": 5}))
            .unwrap();

        let expected = vec![ServerMessage::Event(ServerEvent::Pointer {
            origin_id: a.id,
            position: PointerPosition { x: 5.0, y: 5.0 },
        })];
        assert_eq!(b.received(), expected);
        assert_eq!(c.received(), expected);
        assert!(a.received().is_empty());
    }

    #[test]
    fn malformed_pointer_is_dropped() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);

        let result = session.handle_event(a.id, "client_pointer_event", &json!({"x": 5}));
        assert!(matches!(result, Err(EventError::Malformed { .. })));
        assert!(b.received().is_empty());

        // The relay keeps going.
        session
            .handle_event(a.id, "client_clear_screen_event", &Value::Null)
            .unwrap();
        assert_eq!(
            b.received(),
            vec![ServerMessage::Event(ServerEvent::ClearScreen)]
        );
    }

    #[test]
    fn unknown_event_is_ignored() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);

        let outcome = session
            .handle_event(a.id, "client_chat_event", &json!({"text": "hi"}))
            .unwrap();
        assert!(outcome.is_none());
        assert!(b.received().is_empty());
        assert!(session.canvas().is_empty());
    }

    #[test]
    fn events_from_departed_peers_are_ignored() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);
        session.disconnect(a.id);
        let _ = b.received();

        let outcome = session
            .handle_event(a.id, "client_draw_event", &draw_payload())
            .unwrap();
        assert!(outcome.is_none());
        assert!(b.received().is_empty());
        assert!(session.canvas().is_empty());
    }

    #[test]
    fn late_joiners_replay_drawing_and_clears() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let _b = TestPeer::join(&mut session);
        let _c = TestPeer::join(&mut session);

        // Nothing drawn yet: no replay at all.
        assert!(a.received().is_empty());

        session
            .handle_event(a.id, "client_draw_event", &draw_payload())
            .unwrap();
        // Pointer movement is never part of the replay.
        session
            .handle_event(a.id, "client_pointer_event", &json!({"x": 1, "y": 2}))
            .unwrap();

        let d = TestPeer::join(&mut session);
        assert_eq!(
            d.received(),
            vec![ServerMessage::Replay(vec![ServerEvent::Draw(drawn_stroke())])]
        );

        session
            .handle_event(d.id, "client_clear_screen_event", &json!({}))
            .unwrap();

        let e = TestPeer::join(&mut session);
        assert_eq!(
            e.received(),
            vec![ServerMessage::Replay(vec![ServerEvent::ClearScreen])]
        );
    }

    #[test]
    fn replay_precedes_live_events() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        session
            .handle_event(a.id, "client_draw_event", &draw_payload())
            .unwrap();

        let b = TestPeer::join(&mut session);
        session
            .handle_event(a.id, "client_clear_screen_event", &Value::Null)
            .unwrap();

        let received = b.received();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[0], ServerMessage::Replay(_)));
        assert_eq!(received[1], ServerMessage::Event(ServerEvent::ClearScreen));
    }

    #[test]
    fn disconnect_removes_pointer_everywhere_once() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let b = TestPeer::join(&mut session);
        let c = TestPeer::join(&mut session);

        assert!(session.disconnect(b.id));
        assert!(!session.disconnect(b.id));
        assert_eq!(session.peer_count(), 2);
        assert_eq!(session.state(b.id), Some(ConnectionState::Disconnected));

        let expected = vec![ServerMessage::Event(ServerEvent::RemovePointer {
            origin_id: b.id,
        })];
        assert_eq!(a.received(), expected);
        assert_eq!(c.received(), expected);
    }

    #[test]
    fn peer_that_stops_reading_is_dropped() {
        let mut session = Session::new(100);
        let a = TestPeer::join(&mut session);
        let slow = TestPeer::join_with_capacity(&mut session, 2);
        let c = TestPeer::join(&mut session);

        // The slow peer never drains; the third draw overflows its queue.
        for _ in 0..3 {
            session
                .handle_event(a.id, "client_draw_event", &draw_payload())
                .unwrap();
        }

        assert_eq!(session.state(slow.id), Some(ConnectionState::Disconnected));
        assert_eq!(session.peer_count(), 2);
        assert_eq!(slow.received().len(), 2);

        let received = c.received();
        assert_eq!(received.len(), 4);
        assert_eq!(
            received[3],
            ServerMessage::Event(ServerEvent::RemovePointer { origin_id: slow.id })
        );

        // Later traffic skips the dropped peer and a late disconnect from the
        // transport is a no-op.
        let report = session
            .handle_event(a.id, "client_clear_screen_event", &Value::Null)
            .unwrap()
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert!(!session.disconnect(slow.id));
    }
}

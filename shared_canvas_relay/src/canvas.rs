// Last-known canvas state, replayed to peers when they join.
//
// The relay never renders anything; it only needs enough history for a late
// joiner to rebuild the picture. That history is:
// - whether the canvas has been cleared at least once (the clear marker), and
// - every stroke drawn since the most recent clear, oldest first.
//
// A clear drops all buffered strokes, so a replay after a clear never
// contains stale strokes. Pointer and remove-pointer events are per-peer and
// transient; they are never folded in.
//
// Stroke count is capped at `max_strokes`. Past the cap the oldest stroke is
// evicted, trading a slightly incomplete replay for bounded memory.

use std::collections::VecDeque;

use shared_canvas_protocol::{DrawStroke, ServerEvent};

pub struct CanvasState {
    cleared: bool,
    strokes: VecDeque<DrawStroke>,
    max_strokes: usize,
    evicted: u64,
}

impl CanvasState {
    pub fn new(max_strokes: usize) -> Self {
        Self {
            cleared: false,
            strokes: VecDeque::new(),
            max_strokes,
            evicted: 0,
        }
    }

    /// Fold a relayed event into the state. Transient kinds are ignored.
    pub fn fold(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Draw(stroke) => {
                self.strokes.push_back(stroke.clone());
                while self.strokes.len() > self.max_strokes {
                    self.strokes.pop_front();
                    self.evicted += 1;
                }
            }
            ServerEvent::ClearScreen => {
                self.cleared = true;
                self.strokes.clear();
            }
            ServerEvent::Pointer { .. } | ServerEvent::RemovePointer { .. } => {}
        }
    }

    /// True until the first draw or clear has been folded in.
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.strokes.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Number of strokes dropped because of the cap.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Events a fresh canvas must apply, in order: the clear marker (if any)
    /// followed by the surviving strokes.
    pub fn replay_events(&self) -> Vec<ServerEvent> {
        let mut events = Vec::with_capacity(self.strokes.len() + 1);
        if self.cleared {
            events.push(ServerEvent::ClearScreen);
        }
        events.extend(self.strokes.iter().cloned().map(ServerEvent::Draw));
        events
    }
}

// Event classifier: wire name -> client event -> (optionally stamped)
// server event.
//
// `ROUTES` is the registration table. It is a `static` built from the
// `EventKind` const fns, so it is fixed at compile time and cannot be
// mutated. Each route names the client wire name it answers to, the kind it
// constructs, and whether the resulting server event must be stamped with
// the sender's connection id.
//
// Unknown wire names classify to `Ok(None)`. That is the extension point for
// future event kinds, not an error: a newer client talking to an older relay
// simply has its extra events ignored.

use serde_json::Value;
use shared_canvas_protocol::{ClientEvent, ConnectionId, EventError, EventKind, ServerEvent};

/// One entry of the registration table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Route {
    pub name: &'static str,
    pub kind: EventKind,
    pub needs_origin_stamp: bool,
}

impl Route {
    const fn for_kind(kind: EventKind) -> Self {
        Self {
            name: kind.client_name(),
            kind,
            needs_origin_stamp: kind.needs_origin_stamp(),
        }
    }

    /// Construct the client event this route handles.
    pub fn construct(&self, data: &Value) -> Result<ClientEvent, EventError> {
        ClientEvent::from_serializable_object(self.kind, data)
    }
}

pub static ROUTES: [Route; 4] = [
    Route::for_kind(EventKind::Pointer),
    Route::for_kind(EventKind::RemovePointer),
    Route::for_kind(EventKind::Draw),
    Route::for_kind(EventKind::ClearScreen),
];

/// Look up the route for a client wire name.
pub fn route(name: &str) -> Option<&'static Route> {
    ROUTES.iter().find(|route| route.name == name)
}

/// Decode a raw wire event. `Ok(None)` for names with no route.
pub fn classify(name: &str, data: &Value) -> Result<Option<ClientEvent>, EventError> {
    match route(name) {
        Some(route) => route.construct(data).map(Some),
        None => Ok(None),
    }
}

/// Convert to the server event, supplying `sender` as the origin only for
/// kinds that need stamping.
pub fn stamp(event: &ClientEvent, sender: ConnectionId) -> Result<ServerEvent, EventError> {
    let origin = event.kind().needs_origin_stamp().then_some(sender);
    event.to_server_event(origin)
}

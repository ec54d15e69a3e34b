// Error taxonomy for event decoding and conversion.
//
// Neither variant is fatal to the relay. `Malformed` means a peer sent a
// payload that fails the schema for its kind; the event is dropped.
// `MissingOrigin` means a stamped kind was converted without an identity,
// which is a contract violation inside the relay; that event is dropped too.

use thiserror::Error;

/// Failure to decode or convert a single canvas event.
#[derive(Debug, Error)]
pub enum EventError {
    /// Payload is missing required fields or has fields of the wrong type.
    #[error("malformed {event} payload: {source}")]
    Malformed {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A stamped event kind was converted without an origin identity.
    #[error("{event} requires an origin id")]
    MissingOrigin { event: &'static str },
}

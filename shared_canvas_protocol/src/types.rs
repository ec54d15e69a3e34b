// Core ID types for the canvas protocol.
//
// `ConnectionId` is the identity the relay assigns to each transport
// connection. It is what gets stamped into pointer events as `originId` and
// what the dispatcher compares against when excluding the sender from a
// broadcast. Ids are handed out monotonically and never reused within one
// relay process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Relay-assigned connection identity, stable for the connection's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

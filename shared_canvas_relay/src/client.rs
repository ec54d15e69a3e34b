// Blocking TCP client for the canvas relay.
//
// Used by the integration tests and handy for scripted demos. Architecture:
// - `connect()` opens the TCP stream on the calling thread and spawns a
//   background reader thread. There is no handshake; the relay registers the
//   connection as soon as it is accepted.
// - The reader thread calls `read_frame()` in a loop, decodes each envelope
//   into a `ServerMessage`, and pushes it into an `mpsc` channel. Unknown
//   event names are skipped, matching the relay's own permissive decoding.
// - The calling thread holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox without blocking; `recv_timeout()` waits for
//   one message.

use std::io::{BufReader, BufWriter};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use shared_canvas_protocol::framing::{read_frame, write_frame};
use shared_canvas_protocol::{ClientEvent, Envelope, ServerMessage};
use tracing::debug;

use crate::error::ClientError;

/// TCP client for relay communication.
pub struct CanvasClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: JoinHandle<()>,
}

impl CanvasClient {
    /// Connect to a relay and start the background reader.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).map_err(ClientError::Connect)?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;

        let (tx, inbox) = mpsc::channel();
        let reader_thread = thread::spawn(move || reader_loop(BufReader::new(read_half), tx));

        Ok(Self {
            writer: BufWriter::new(stream),
            inbox,
            _reader_thread: reader_thread,
        })
    }

    /// Send a canvas event to the relay.
    pub fn send(&mut self, event: &ClientEvent) -> Result<(), ClientError> {
        self.send_envelope(&Envelope::from_client_event(event))
    }

    /// Send an arbitrary envelope, including names or payloads the relay
    /// will reject.
    pub fn send_envelope(&mut self, envelope: &Envelope) -> Result<(), ClientError> {
        let json = serde_json::to_vec(envelope)?;
        write_frame(&mut self.writer, &json)?;
        Ok(())
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next server message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ServerMessage> {
        self.inbox.recv_timeout(timeout).ok()
    }

    /// Close the connection. The relay sees this as an ordinary disconnect.
    pub fn disconnect(self) {
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

/// Reader thread: read framed envelopes in a loop, push decoded messages.
fn reader_loop(mut reader: BufReader<TcpStream>, tx: Sender<ServerMessage>) {
    while let Ok(bytes) = read_frame(&mut reader) {
        let envelope = match serde_json::from_slice::<Envelope>(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "relay sent a frame that is not an envelope");
                break;
            }
        };
        match ServerMessage::from_envelope(&envelope) {
            Ok(Some(message)) => {
                if tx.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => debug!(event = %envelope.event, "skipping unknown event"),
            Err(e) => debug!(error = %e, "skipping undecodable event"),
        }
    }
}

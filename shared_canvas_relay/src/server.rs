// TCP transport and main event loop for the canvas relay.
//
// Architecture: thread-per-reader, thread-per-writer, one central `mpsc`
// channel.
//
// - **Listener thread** (`TcpListener::accept()` loop): accepts connections
//   and sends `InternalEvent::NewConnection` to the main thread.
// - **Reader threads** (one per peer): call `read_frame()` in a loop, decode
//   each frame as an `Envelope`, and send `InternalEvent::MessageFrom` to the
//   main thread. A frame that is not a valid envelope is dropped and the
//   connection stays up. On EOF or any I/O error the thread sends exactly one
//   `InternalEvent::Disconnected` and exits.
// - **Writer threads** (one per peer): drain that peer's bounded outbound
//   frame queue onto the socket. When the peer is unregistered its queue
//   sender is dropped, the loop ends, and the writer shuts the socket down,
//   which in turn wakes the reader with EOF. A write that makes no progress
//   for `WRITE_TIMEOUT` ends the writer the same way.
// - **Main thread**: owns the `Session` and handles one event at a time in
//   arrival order. It never touches a socket directly; it only pushes frames
//   into queues without blocking, so a slow peer cannot stall anyone else.
//   A peer whose queue fills up is dropped by the session.
//
// Shutdown: `RelayHandle::stop` clears `keep_running`; the main loop notices
// within `POLL_INTERVAL`, drops the session (closing every queue), and exits.

use std::io::{BufReader, BufWriter};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use shared_canvas_protocol::framing::{read_frame, write_frame};
use shared_canvas_protocol::{ConnectionId, Envelope};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::registry::{Frame, OUTBOX_CAPACITY};
use crate::session::Session;

/// How often the main and listener loops re-check `keep_running`.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long a single socket write may stall before the peer is cut off.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Events sent from listener/reader threads to the main thread.
enum InternalEvent {
    NewConnection {
        stream: TcpStream,
        addr: SocketAddr,
    },
    MessageFrom {
        id: ConnectionId,
        envelope: Envelope,
    },
    Disconnected {
        id: ConnectionId,
    },
}

/// Handle returned by `start_relay` to control the running relay.
pub struct RelayHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RelayHandle {
    /// Signal the relay to stop and wait for it to shut down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the relay loop exits on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("relay thread panicked");
        }
    }
}

/// Configuration for starting a relay.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    /// Strokes kept for join-time replay; oldest are evicted first.
    pub max_replay_strokes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 7878,
            max_replay_strokes: 100_000,
        }
    }
}

/// Start the relay on a background thread. Returns a handle for stopping it
/// and the actual bound address (useful with port 0).
pub fn start_relay(config: RelayConfig) -> Result<(RelayHandle, SocketAddr), RelayError> {
    let requested = SocketAddr::new(config.bind_addr, config.port);
    let listener = TcpListener::bind(requested).map_err(|source| RelayError::Bind {
        addr: requested,
        source,
    })?;
    let addr = listener.local_addr()?;
    // Non-blocking so the accept loop can check keep_running periodically.
    listener.set_nonblocking(true)?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_clone = Arc::clone(&keep_running);
    let thread = thread::Builder::new()
        .name("canvas-relay".into())
        .spawn(move || run_relay(listener, config, keep_running_clone))?;

    info!(%addr, "relay listening");
    Ok((
        RelayHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Main relay loop. Runs until `keep_running` is cleared.
fn run_relay(listener: TcpListener, config: RelayConfig, keep_running: Arc<AtomicBool>) {
    let mut session = Session::new(config.max_replay_strokes);
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    let keep_running_listener = Arc::clone(&keep_running);
    let tx_listener = tx.clone();
    thread::spawn(move || accept_loop(listener, tx_listener, keep_running_listener));

    while keep_running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(event) => handle_event(&mut session, event, &tx, &keep_running),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(peers = session.peer_count(), "relay shutting down");
}

fn accept_loop(listener: TcpListener, tx: Sender<InternalEvent>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                if let Err(e) = stream.set_nonblocking(false) {
                    warn!(%addr, error = %e, "could not configure accepted stream");
                    continue;
                }
                if tx.send(InternalEvent::NewConnection { stream, addr }).is_err() {
                    break;
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                warn!(error = %e, "accept failed; listener stopping");
                break;
            }
        }
    }
}

/// Dispatch a single event to the session.
fn handle_event(
    session: &mut Session,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream, addr } => {
            handle_new_connection(session, stream, addr, tx, keep_running);
        }
        InternalEvent::MessageFrom { id, envelope } => {
            if let Err(e) = session.handle_event(id, &envelope.event, &envelope.data) {
                warn!(peer = %id, event = %envelope.event, error = %e, "dropping event");
            }
        }
        InternalEvent::Disconnected { id } => {
            session.disconnect(id);
        }
    }
}

/// Connecting -> Connected for a fresh TCP stream: start its writer, register
/// it (which queues the replay), then start its reader.
fn handle_new_connection(
    session: &mut Session,
    stream: TcpStream,
    addr: SocketAddr,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    let id = match session.accept() {
        Ok(id) => id,
        Err(e) => {
            warn!(%addr, error = %e, "refusing connection");
            return;
        }
    };
    debug!(peer = %id, %addr, "accepted connection");

    let read_half = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            warn!(peer = %id, error = %e, "could not split stream");
            session.disconnect(id);
            return;
        }
    };

    if let Err(e) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
        warn!(peer = %id, error = %e, "could not set write timeout");
    }
    let (outbox, queue) = mpsc::sync_channel::<Frame>(OUTBOX_CAPACITY);
    thread::spawn(move || writer_loop(stream, queue));

    if let Err(e) = session.connect(id, outbox) {
        warn!(peer = %id, error = %e, "registration failed");
        return;
    }

    let tx_reader = tx.clone();
    let keep_running_reader = Arc::clone(keep_running);
    thread::spawn(move || reader_loop(BufReader::new(read_half), id, tx_reader, keep_running_reader));
}

/// Reader loop for a single peer. Runs in its own thread.
fn reader_loop(
    mut reader: BufReader<TcpStream>,
    id: ConnectionId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match read_frame(&mut reader) {
            Ok(bytes) => match serde_json::from_slice::<Envelope>(&bytes) {
                Ok(envelope) => {
                    if tx.send(InternalEvent::MessageFrom { id, envelope }).is_err() {
                        return;
                    }
                }
                Err(e) => warn!(peer = %id, error = %e, "discarding frame that is not an envelope"),
            },
            Err(e) => {
                debug!(peer = %id, error = %e, "read ended");
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { id });
}

/// Writer loop for a single peer. Ends when the queue closes (peer
/// unregistered) or the socket errors or times out, then shuts the socket
/// down.
fn writer_loop(stream: TcpStream, queue: Receiver<Frame>) {
    {
        let mut writer = BufWriter::new(&stream);
        for frame in queue {
            if write_frame(&mut writer, &frame).is_err() {
                break;
            }
        }
    }
    let _ = stream.shutdown(Shutdown::Both);
}

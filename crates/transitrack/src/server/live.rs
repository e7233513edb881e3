//! Live channel: newline-delimited JSON events over TCP.
//!
//! Dashboards connect to receive `locationUpdate` events as they are
//! published; drivers may push reports over the same connection. Each
//! line on the wire is one JSON event envelope:
//!
//! ```json
//! {"event": "locationUpdate", "data": {"entityId": "bus-1", ...}}
//! ```
//!
//! Every connection is tracked by the [`ConnectionManager`] through its
//! lifecycle, and holds exactly one hub subscription while connected.
//! Disconnect is idempotent: whichever of EOF, read error, or write
//! error fires first deregisters the subscription exactly once.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::hub::Subscription;
use crate::ingest::LocationIngest;
use crate::report::{LocationUpdate, ReportInput};

/// Wire name of the location event in both directions.
pub const LOCATION_EVENT: &str = "locationUpdate";

/// The envelope every wire line carries.
#[derive(Debug, Serialize, Deserialize)]
struct WireEvent {
    event: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Lifecycle state of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted but not yet subscribed to the hub.
    Connecting,
    /// Subscribed and receiving events.
    Connected,
    /// Torn down; the subscription is gone.
    Disconnected,
}

/// Registry of live connections and their states.
///
/// Owns a handle to the hub so that connecting and disconnecting keep
/// the subscriber registry and the state map in step.
#[derive(Debug)]
pub struct ConnectionManager {
    hub: Arc<crate::hub::BroadcastHub>,
    states: Mutex<HashMap<u64, ConnectionState>>,
    next_id: AtomicU64,
}

impl ConnectionManager {
    /// Create a manager over the given hub.
    #[must_use]
    pub fn new(hub: Arc<crate::hub::BroadcastHub>) -> Self {
        Self {
            hub,
            states: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a new connection in the `Connecting` state.
    pub fn open(self: &Arc<Self>) -> ConnectionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock_states().insert(id, ConnectionState::Connecting);
        debug!(connection_id = id, "Live connection opened");

        ConnectionHandle {
            manager: Arc::clone(self),
            id,
            subscriber_id: AtomicU64::new(u64::MAX),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Look up the state of a connection, if it is still tracked.
    #[must_use]
    pub fn state(&self, id: u64) -> Option<ConnectionState> {
        self.lock_states().get(&id).copied()
    }

    /// Number of connections currently tracked (any state).
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.lock_states().len()
    }

    fn set_state(&self, id: u64, state: ConnectionState) {
        self.lock_states().insert(id, state);
    }

    fn remove(&self, id: u64) {
        self.lock_states().remove(&id);
    }

    fn lock_states(&self) -> std::sync::MutexGuard<'_, HashMap<u64, ConnectionState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One tracked connection's handle into the manager.
///
/// Dropping the handle disconnects it; explicit [`disconnect`] calls
/// are safe to repeat.
///
/// [`disconnect`]: ConnectionHandle::disconnect
#[derive(Debug)]
pub struct ConnectionHandle {
    manager: Arc<ConnectionManager>,
    id: u64,
    subscriber_id: AtomicU64,
    disconnected: AtomicBool,
}

impl ConnectionHandle {
    /// The manager-assigned connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribe to the hub and move to `Connected`.
    pub fn connect(&self) -> Subscription {
        let subscription = self.manager.hub.subscribe();
        self.subscriber_id
            .store(subscription.id(), Ordering::Relaxed);
        self.manager.set_state(self.id, ConnectionState::Connected);
        debug!(
            connection_id = self.id,
            subscriber_id = subscription.id(),
            "Live connection subscribed"
        );
        subscription
    }

    /// Tear the connection down.
    ///
    /// The first call deregisters the hub subscription and removes the
    /// connection from the manager; later calls are no-ops, so racing
    /// teardown paths (EOF vs. write error) are harmless.
    pub fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscriber_id = self.subscriber_id.load(Ordering::Relaxed);
        if subscriber_id != u64::MAX {
            self.manager.hub.unsubscribe(subscriber_id);
        }
        self.manager.set_state(self.id, ConnectionState::Disconnected);
        self.manager.remove(self.id);
        debug!(connection_id = self.id, "Live connection closed");
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// The live TCP listener.
#[derive(Debug)]
pub struct LiveServer {
    ingest: LocationIngest,
    manager: Arc<ConnectionManager>,
}

impl LiveServer {
    /// Create a server over the given ingest pipeline.
    ///
    /// The connection manager is built over the same hub the ingest
    /// publishes to.
    #[must_use]
    pub fn new(ingest: LocationIngest) -> Self {
        let manager = Arc::new(ConnectionManager::new(ingest.hub()));
        Self { ingest, manager }
    }

    /// Handle to the connection manager.
    #[must_use]
    pub fn manager(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.manager)
    }

    /// Bind the listener and serve until the task is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Live channel listening on {addr}");
        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails fatally.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!(%peer, "Accepted live connection");

            let ingest = self.ingest.clone();
            let handle = self.manager.open();
            tokio::spawn(async move {
                handle_connection(stream, ingest, handle).await;
            });
        }
    }
}

/// Drive one connection: fan events out, take reports in.
async fn handle_connection(stream: TcpStream, ingest: LocationIngest, handle: ConnectionHandle) {
    let mut subscription = handle.connect();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        tokio::select! {
            update = subscription.recv() => {
                let Some(update) = update else {
                    break;
                };
                if write_update(&mut writer, &update).await.is_err() {
                    debug!(connection_id = handle.id(), "Write failed, closing");
                    break;
                }
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => handle_line(&ingest, &line),
                    Ok(None) => {
                        debug!(connection_id = handle.id(), "Peer closed connection");
                        break;
                    }
                    Err(err) => {
                        debug!(connection_id = handle.id(), "Read failed: {err}");
                        break;
                    }
                }
            }
        }
    }

    handle.disconnect();
}

/// Serialize one event envelope and write it as a line.
async fn write_update(
    writer: &mut (impl AsyncWriteExt + Unpin),
    update: &LocationUpdate,
) -> std::io::Result<()> {
    let envelope = WireEvent {
        event: LOCATION_EVENT.to_string(),
        data: serde_json::to_value(update).unwrap_or(serde_json::Value::Null),
    };
    let mut line = serde_json::to_vec(&envelope)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Parse one inbound line and feed location events into the pipeline.
///
/// Malformed lines and unknown event names are logged and skipped; the
/// connection stays up.
fn handle_line(ingest: &LocationIngest, line: &str) {
    if line.trim().is_empty() {
        return;
    }

    let envelope: WireEvent = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("Dropping malformed live event: {err}");
            return;
        }
    };

    if envelope.event != LOCATION_EVENT {
        warn!(event = %envelope.event, "Ignoring unknown live event");
        return;
    }

    match serde_json::from_value::<ReportInput>(envelope.data) {
        Ok(input) => ingest.submit_streamed(input),
        Err(err) => warn!("Dropping malformed location payload: {err}"),
    }
}

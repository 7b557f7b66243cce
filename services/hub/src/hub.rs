//! In-process registry and dispatcher of connected clients.
//!
//! The hub keeps two indices — session id to client, map id to session set —
//! and guarantees they agree: a client is in one iff it is in the other.
//! All index mutations funnel through a single control loop; read-only
//! observers take the reader lock directly.
//!
//! Fan-out never blocks a caller.  Per-recipient enqueue is non-blocking and
//! a full queue marks the recipient stalled: it is evicted from both indices
//! and its queue closes, which the write pump observes on its next cycle.
//! Broadcast commands submitted while the command queue is full are dropped
//! with a warning.

use crate::config::HubConfig;
use plaza_protocol::{Envelope, ServerMessage};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::{debug, info, warn};

/// Register/deregister queue depth.  Unlike broadcasts, these commands are
/// never dropped; submitters await the channel.
const CONTROL_QUEUE_CAPACITY: usize = 64;

static NEXT_CONN_SEQ: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// Client handle
// ---------------------------------------------------------------------------

/// Frames travelling down a client's outbound queue to its write pump.
#[derive(Debug)]
pub enum OutboundFrame {
    Message(Envelope<ServerMessage>),
    /// Reply to a client ping, forwarded so all socket writes stay in the
    /// write pump.
    Pong(Vec<u8>),
    /// Queue-closure marker: the write pump flushes everything queued ahead
    /// of it, then exits.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is full: the client is stalled.
    Full,
    /// The queue is gone: the client is already terminating.
    Closed,
}

/// The hub-facing side of one live connection.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub session_id: String,
    pub user_id: String,
    pub map_id: String,
    conn_seq: u64,
    sender: mpsc::Sender<OutboundFrame>,
}

impl ClientHandle {
    pub fn new(
        session_id: String,
        user_id: String,
        map_id: String,
        sender: mpsc::Sender<OutboundFrame>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            map_id,
            conn_seq: NEXT_CONN_SEQ.fetch_add(1, Ordering::Relaxed),
            sender,
        }
    }

    /// Process-unique connection number.  Distinguishes this connection from
    /// a later one that took over the same session id.
    pub fn conn_seq(&self) -> u64 {
        self.conn_seq
    }

    pub fn try_enqueue(&self, frame: OutboundFrame) -> Result<(), EnqueueError> {
        self.sender.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => EnqueueError::Full,
            TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Stamp and enqueue a server message.
    pub fn enqueue_message(&self, message: ServerMessage) -> Result<(), EnqueueError> {
        self.try_enqueue(OutboundFrame::Message(Envelope::new(message)))
    }
}

/// One row of a map roster snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapMember {
    pub session_id: String,
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum ControlCommand {
    Register {
        client: ClientHandle,
        done: oneshot::Sender<()>,
    },
    Deregister {
        session_id: String,
        conn_seq: u64,
        done: Option<oneshot::Sender<bool>>,
    },
}

enum BroadcastScope {
    Map {
        map_id: String,
        except: Option<String>,
    },
    All,
}

struct BroadcastCommand {
    scope: BroadcastScope,
    message: ServerMessage,
}

#[derive(Debug, thiserror::Error)]
#[error("hub control loop is gone")]
pub struct HubUnavailable;

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Indices {
    by_session: HashMap<String, ClientHandle>,
    by_map: HashMap<String, HashSet<String>>,
}

impl Indices {
    /// Remove `session_id` from both indices if it is still held by
    /// `conn_seq`.  Returns the removed handle.
    fn remove(&mut self, session_id: &str, conn_seq: u64) -> Option<ClientHandle> {
        match self.by_session.get(session_id) {
            Some(current) if current.conn_seq == conn_seq => {}
            _ => return None,
        }
        let client = self.by_session.remove(session_id)?;
        if let Some(sessions) = self.by_map.get_mut(&client.map_id) {
            sessions.remove(session_id);
            if sessions.is_empty() {
                self.by_map.remove(&client.map_id);
            }
        }
        // Close the queue: queued frames still flush, then the write pump
        // exits.  Best-effort — a full queue means the pump is already
        // stuck and the write deadline reaps it instead.
        let _ = client.sender.try_send(OutboundFrame::Shutdown);
        Some(client)
    }

    fn insert(&mut self, client: ClientHandle) {
        self.by_map
            .entry(client.map_id.clone())
            .or_default()
            .insert(client.session_id.clone());
        self.by_session.insert(client.session_id.clone(), client);
    }
}

pub struct Hub {
    indices: RwLock<Indices>,
    control_tx: mpsc::Sender<ControlCommand>,
    broadcast_tx: mpsc::Sender<BroadcastCommand>,
}

impl Hub {
    /// Build the hub and spawn its control loop.
    pub fn new(config: &HubConfig) -> Arc<Self> {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_QUEUE_CAPACITY);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(config.broadcast_queue_capacity);
        let hub = Arc::new(Self {
            indices: RwLock::new(Indices::default()),
            control_tx,
            broadcast_tx,
        });
        tokio::spawn(Arc::clone(&hub).run(control_rx, broadcast_rx));
        hub
    }

    // -- control loop -------------------------------------------------------

    async fn run(
        self: Arc<Self>,
        mut control_rx: mpsc::Receiver<ControlCommand>,
        mut broadcast_rx: mpsc::Receiver<BroadcastCommand>,
    ) {
        loop {
            tokio::select! {
                command = control_rx.recv() => match command {
                    Some(command) => self.apply_control(command).await,
                    None => break,
                },
                command = broadcast_rx.recv() => match command {
                    Some(command) => self.dispatch(command).await,
                    None => break,
                },
            }
        }
    }

    async fn apply_control(&self, command: ControlCommand) {
        match command {
            ControlCommand::Register { client, done } => {
                let mut indices = self.indices.write().await;
                // At most one live client per session id: a reconnect takes
                // over and the prior connection's queue closes.
                if let Some(prior) = indices.by_session.get(&client.session_id) {
                    let prior_seq = prior.conn_seq;
                    indices.remove(&client.session_id, prior_seq);
                    warn!(
                        session_id = %client.session_id,
                        "evicted prior connection for re-registering session"
                    );
                }
                let map_id = client.map_id.clone();
                indices.insert(client);
                let in_map = indices.by_map.get(&map_id).map_or(0, HashSet::len);
                info!(map_id = %map_id, sessions = in_map, "session registered");
                drop(indices);
                let _ = done.send(());
            }
            ControlCommand::Deregister {
                session_id,
                conn_seq,
                done,
            } => {
                let mut indices = self.indices.write().await;
                let removed = indices.remove(&session_id, conn_seq).is_some();
                drop(indices);
                if removed {
                    debug!(session_id = %session_id, "session deregistered");
                }
                if let Some(done) = done {
                    let _ = done.send(removed);
                }
            }
        }
    }

    async fn dispatch(&self, command: BroadcastCommand) {
        let mut indices = self.indices.write().await;
        let recipients: Vec<String> = match &command.scope {
            BroadcastScope::Map { map_id, except } => match indices.by_map.get(map_id) {
                Some(sessions) => sessions
                    .iter()
                    .filter(|sid| Some(sid.as_str()) != except.as_deref())
                    .cloned()
                    .collect(),
                None => return,
            },
            BroadcastScope::All => indices.by_session.keys().cloned().collect(),
        };

        let envelope = Envelope::new(command.message);
        let mut stalled: Vec<(String, u64)> = Vec::new();
        for session_id in recipients {
            let Some(client) = indices.by_session.get(&session_id) else {
                continue;
            };
            if let Err(reason) = client.try_enqueue(OutboundFrame::Message(envelope.clone())) {
                warn!(
                    session_id = %session_id,
                    kind = envelope.message.kind(),
                    ?reason,
                    "outbound queue rejected broadcast, evicting recipient"
                );
                stalled.push((session_id, client.conn_seq));
            }
        }
        // A stalled recipient never holds up the others; it just drops out.
        for (session_id, conn_seq) in stalled {
            indices.remove(&session_id, conn_seq);
        }
    }

    // -- registration -------------------------------------------------------

    /// Insert the client into both indices, evicting any prior holder of the
    /// same session id.  Resolves once the control loop has applied it.
    pub async fn register(&self, client: ClientHandle) -> Result<(), HubUnavailable> {
        let (done, applied) = oneshot::channel();
        self.control_tx
            .send(ControlCommand::Register { client, done })
            .await
            .map_err(|_| HubUnavailable)?;
        applied.await.map_err(|_| HubUnavailable)
    }

    /// Remove the client from both indices and close its queue.  Idempotent:
    /// repeating it, or racing it against a takeover by a newer connection,
    /// is a no-op.  Returns whether this call performed the removal.
    pub async fn deregister(&self, session_id: &str, conn_seq: u64) -> bool {
        let (done, applied) = oneshot::channel();
        let command = ControlCommand::Deregister {
            session_id: session_id.to_owned(),
            conn_seq,
            done: Some(done),
        };
        if self.control_tx.send(command).await.is_err() {
            return false;
        }
        applied.await.unwrap_or(false)
    }

    /// Fire-and-forget eviction for paths that must not block (enqueue
    /// failures outside the control loop).
    pub(crate) fn evict(&self, session_id: &str, conn_seq: u64) {
        let command = ControlCommand::Deregister {
            session_id: session_id.to_owned(),
            conn_seq,
            done: None,
        };
        if self.control_tx.try_send(command).is_err() {
            // The write deadline will reap the connection instead.
            warn!(session_id = %session_id, "control queue full, eviction deferred");
        }
    }

    // -- fan-out ------------------------------------------------------------

    /// Queue a broadcast to every session in `map_id`.  Returns false when
    /// the command queue is full and the broadcast was dropped.
    pub fn broadcast_to_map(&self, map_id: &str, message: ServerMessage) -> bool {
        self.submit(BroadcastCommand {
            scope: BroadcastScope::Map {
                map_id: map_id.to_owned(),
                except: None,
            },
            message,
        })
    }

    /// As [`broadcast_to_map`](Self::broadcast_to_map), excluding one session.
    pub fn broadcast_to_map_except(
        &self,
        map_id: &str,
        except_session_id: &str,
        message: ServerMessage,
    ) -> bool {
        self.submit(BroadcastCommand {
            scope: BroadcastScope::Map {
                map_id: map_id.to_owned(),
                except: Some(except_session_id.to_owned()),
            },
            message,
        })
    }

    pub fn broadcast_to_all(&self, message: ServerMessage) -> bool {
        self.submit(BroadcastCommand {
            scope: BroadcastScope::All,
            message,
        })
    }

    fn submit(&self, command: BroadcastCommand) -> bool {
        match self.broadcast_tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                warn!(
                    kind = command.message.kind(),
                    "broadcast command queue full, dropping"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("broadcast submitted after hub shutdown");
                false
            }
        }
    }

    /// Deliver directly to the first client whose user id matches, skipping
    /// `except_session_id`.  A user has at most one live session in
    /// practice; ties break by iteration order.  Returns whether a matching
    /// live session accepted the message.
    pub async fn broadcast_to_user(
        &self,
        user_id: &str,
        except_session_id: Option<&str>,
        message: ServerMessage,
    ) -> bool {
        let indices = self.indices.read().await;
        let target = indices.by_session.values().find(|client| {
            client.user_id == user_id && Some(client.session_id.as_str()) != except_session_id
        });
        let Some(client) = target else {
            return false;
        };
        match client.enqueue_message(message) {
            Ok(()) => true,
            Err(reason) => {
                let (session_id, conn_seq) = (client.session_id.clone(), client.conn_seq);
                drop(indices);
                warn!(session_id = %session_id, ?reason, "evicting stalled call target");
                self.evict(&session_id, conn_seq);
                false
            }
        }
    }

    // -- snapshot queries ---------------------------------------------------

    pub async fn count(&self) -> usize {
        self.indices.read().await.by_session.len()
    }

    pub async fn count_in_map(&self, map_id: &str) -> usize {
        self.indices
            .read()
            .await
            .by_map
            .get(map_id)
            .map_or(0, HashSet::len)
    }

    pub async fn is_connected(&self, session_id: &str) -> bool {
        self.indices.read().await.by_session.contains_key(session_id)
    }

    /// Whether `conn_seq` is still the registered connection for the session.
    pub async fn is_current(&self, session_id: &str, conn_seq: u64) -> bool {
        self.indices
            .read()
            .await
            .by_session
            .get(session_id)
            .is_some_and(|client| client.conn_seq == conn_seq)
    }

    pub async fn maps(&self) -> Vec<String> {
        self.indices.read().await.by_map.keys().cloned().collect()
    }

    /// Roster of `(session, user)` pairs currently on a map.
    pub async fn sessions_in_map(&self, map_id: &str) -> Vec<MapMember> {
        let indices = self.indices.read().await;
        let Some(sessions) = indices.by_map.get(map_id) else {
            return Vec::new();
        };
        sessions
            .iter()
            .filter_map(|sid| indices.by_session.get(sid))
            .map(|client| MapMember {
                session_id: client.session_id.clone(),
                user_id: client.user_id.clone(),
            })
            .collect()
    }

    #[cfg(test)]
    async fn assert_indices_consistent(&self) {
        let indices = self.indices.read().await;
        for (session_id, client) in &indices.by_session {
            let in_map = indices
                .by_map
                .get(&client.map_id)
                .is_some_and(|sessions| sessions.contains(session_id));
            assert!(in_map, "session {session_id} missing from its map set");
        }
        for (map_id, sessions) in &indices.by_map {
            assert!(!sessions.is_empty(), "map {map_id} kept an empty set");
            for session_id in sessions {
                let linked = indices
                    .by_session
                    .get(session_id)
                    .is_some_and(|client| client.map_id == *map_id);
                assert!(linked, "map {map_id} holds unindexed session {session_id}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

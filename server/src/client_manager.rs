//! Connection registry for the multiplayer server
//!
//! This module tracks every open WebSocket connection, including:
//! - Connection lifecycle phase (connecting, joined, active, disconnected, kicked)
//! - The player name bound to a connection once its join succeeds
//! - Idle-timeout detection
//! - Capacity limits and the outbound queue used to reach each socket
//!
//! The registry never touches game state; the server loop keeps the two in
//! step when a connection joins or goes away.

use log::info;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

pub type ConnectionId = u64;

/// Per-connection outbound queue length.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Lifecycle of a single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Socket open, no accepted join yet.
    Connecting,
    /// Join accepted, no gameplay traffic yet.
    Joined,
    /// Sending position reports or fire requests.
    Active,
    Disconnected,
    Kicked,
}

impl ConnectionPhase {
    /// Whether this connection should receive snapshots.
    pub fn in_game(self) -> bool {
        matches!(self, ConnectionPhase::Joined | ConnectionPhase::Active)
    }

    /// False once the server has started closing the connection.
    pub fn is_live(self) -> bool {
        !matches!(self, ConnectionPhase::Disconnected | ConnectionPhase::Kicked)
    }
}

/// Work item for a connection's writer task.
#[derive(Debug, Clone)]
pub enum Outbound {
    Text(Arc<str>),
    Close(Option<CloseFrame<'static>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    /// Queue full; the item was dropped.
    Skipped,
    /// Writer task has already exited.
    Gone,
}

/// One open connection and the player bound to it, if any.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub phase: ConnectionPhase,
    pub player_name: Option<String>,
    /// Last time any valid message arrived from this connection
    pub last_seen: Instant,
    sender: mpsc::Sender<Outbound>,
}

impl Connection {
    pub fn new(id: ConnectionId, addr: SocketAddr, sender: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            addr,
            phase: ConnectionPhase::Connecting,
            player_name: None,
            last_seen: Instant::now(),
            sender,
        }
    }

    /// Queues an item without waiting. A full queue drops the item.
    pub fn send(&self, item: Outbound) -> SendOutcome {
        match self.sender.try_send(item) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Skipped,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Gone,
        }
    }

    /// True if nothing arrived from this connection for `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Tracks every open connection and enforces the capacity limit.
pub struct ClientManager {
    /// Ordered by id so broadcasts go out in connection order
    connections: BTreeMap<ConnectionId, Connection>,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            connections: BTreeMap::new(),
            max_clients,
            timeout,
        }
    }

    /// Registers a connection. Returns false when the server is full or the id
    /// is already registered.
    pub fn add_connection(
        &mut self,
        id: ConnectionId,
        addr: SocketAddr,
        sender: mpsc::Sender<Outbound>,
    ) -> bool {
        if self.is_full() || self.connections.contains_key(&id) {
            return false;
        }
        info!("Connection {} opened from {}", id, addr);
        self.connections
            .insert(id, Connection::new(id, addr, sender));
        true
    }

    /// Removes a connection. Removing an unknown id is a no-op.
    pub fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        info!("Connection {} closed", id);
        Some(connection)
    }

    /// Looks up a registered connection, in any phase.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Name of the player bound to a connection, if it joined.
    pub fn player_name(&self, id: ConnectionId) -> Option<&str> {
        self.connections.get(&id)?.player_name.as_deref()
    }

    /// Refreshes the idle timer for a connection.
    pub fn touch(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_seen = Instant::now();
        }
    }

    /// Binds a player to the connection after a successful join.
    pub fn mark_joined(&mut self, id: ConnectionId, name: &str) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.phase = ConnectionPhase::Joined;
            connection.player_name = Some(name.to_string());
        }
    }

    /// Moves a joined connection to `Active` on its first gameplay message.
    pub fn mark_active(&mut self, id: ConnectionId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            if connection.phase == ConnectionPhase::Joined {
                connection.phase = ConnectionPhase::Active;
            }
        }
    }

    /// Unbinds the player after an explicit leave. Returns the player's name.
    pub fn mark_left(&mut self, id: ConnectionId) -> Option<String> {
        let connection = self.connections.get_mut(&id)?;
        connection.phase = ConnectionPhase::Disconnected;
        connection.player_name.take()
    }

    /// Unbinds the player of a connection the server is closing.
    pub fn mark_kicked(&mut self, id: ConnectionId) -> Option<String> {
        let connection = self.connections.get_mut(&id)?;
        connection.phase = ConnectionPhase::Kicked;
        connection.player_name.take()
    }

    /// Returns live connections that have been silent for longer than the timeout.
    pub fn check_timeouts(&self) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| c.phase.is_live() && c.is_timed_out(self.timeout))
            .map(|c| c.id)
            .collect()
    }

    /// Connections that should receive snapshots.
    pub fn in_game(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| c.phase.in_game())
    }

    /// Snapshot of every registered id, safe to iterate while mutating.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// True when no further connection would be accepted.
    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

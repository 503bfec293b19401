//! Connection management for WebSocket clients.
//!
//! Tracks connected clients and the guild rooms they joined. Delivery is a
//! `try_send` into each connection's bounded channel, so a slow client only
//! loses its own messages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use herotycoon_shared::ServerMessage;

use crate::infrastructure::ports::RealtimePort;

/// Information about a connected client.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: Uuid,
    /// Client-supplied identifier (may be anonymous)
    pub user_id: String,
    /// Joined rooms, e.g. `guild:<id>`
    pub rooms: HashSet<String>,
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    /// Map of connection_id -> (ConnectionInfo, sender channel)
    connections: RwLock<HashMap<Uuid, (ConnectionInfo, mpsc::Sender<ServerMessage>)>>,
}

pub type SharedConnectionManager = Arc<ConnectionManager>;

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register(
        &self,
        connection_id: Uuid,
        user_id: String,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let info = ConnectionInfo {
            connection_id,
            user_id,
            rooms: HashSet::new(),
        };
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, (info, sender));
        tracing::debug!(connection_id = %connection_id, "Connection registered");
    }

    /// Drops the connection and every room membership it held.
    pub async fn unregister(&self, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(&connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Connection unregistered");
        }
    }

    pub async fn join_room(&self, connection_id: Uuid, room: &str) -> Result<(), ConnectionError> {
        let mut connections = self.connections.write().await;
        let (info, _) = connections
            .get_mut(&connection_id)
            .ok_or(ConnectionError::NotFound)?;
        if info.rooms.insert(room.to_string()) {
            tracing::info!(connection_id = %connection_id, room = %room, "Connection joined room");
        }
        Ok(())
    }

    pub async fn leave_room(&self, connection_id: Uuid, room: &str) {
        let mut connections = self.connections.write().await;
        if let Some((info, _)) = connections.get_mut(&connection_id) {
            if info.rooms.remove(room) {
                tracing::info!(connection_id = %connection_id, room = %room, "Connection left room");
            }
        }
    }

    pub async fn is_in_room(&self, connection_id: Uuid, room: &str) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .is_some_and(|(info, _)| info.rooms.contains(room))
    }

    pub async fn room_size(&self, room: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|(info, _)| info.rooms.contains(room))
            .count()
    }

    /// Queue `message` for every connection in `room`. Returns the number of
    /// connections it was queued for.
    pub async fn broadcast_to_room(&self, room: &str, message: ServerMessage) -> usize {
        let connections = self.connections.read().await;
        let mut delivered = 0;
        for (info, sender) in connections.values() {
            if !info.rooms.contains(room) {
                continue;
            }
            match sender.try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    connection_id = %info.connection_id,
                    room = %room,
                    error = %e,
                    "Failed to broadcast message"
                ),
            }
        }
        delivered
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RealtimePort for ConnectionManager {
    async fn publish(&self, room: &str, message: ServerMessage) -> usize {
        self.broadcast_to_room(room, message).await
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectionError {
    #[error("Connection not found")]
    NotFound,
}

//! Room manager: conversation id -> connections subscribed to its events.
//!
//! Room membership is derived state, rebuilt from explicit join events. It
//! is distinct from conversation membership: joining a room grants nothing.
//! Every event-producing operation re-validates membership against the store
//! before broadcasting.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::warn;

use crate::events::{ConnectionId, ServerEvent};
use crate::registry::EventSender;

type Rooms = HashMap<String, HashMap<ConnectionId, EventSender>>;

#[derive(Clone, Default)]
pub struct RoomManager {
    inner: Arc<RwLock<Rooms>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn join(
        &self,
        conversation_id: &str,
        connection_id: ConnectionId,
        sender: EventSender,
    ) {
        let mut rooms = self.inner.write().await;
        rooms
            .entry(conversation_id.to_string())
            .or_default()
            .insert(connection_id, sender);
    }

    pub async fn leave(&self, conversation_id: &str, connection_id: ConnectionId) {
        let mut rooms = self.inner.write().await;
        if let Some(room) = rooms.get_mut(conversation_id) {
            room.remove(&connection_id);
            if room.is_empty() {
                rooms.remove(conversation_id);
            }
        }
    }

    /// Drop a connection from every room it had joined. Backs the implicit
    /// cleanup on disconnect.
    pub async fn leave_all(&self, connection_id: ConnectionId) {
        let mut rooms = self.inner.write().await;
        rooms.retain(|_, room| {
            room.remove(&connection_id);
            !room.is_empty()
        });
    }

    pub async fn occupants(&self, conversation_id: &str) -> Vec<ConnectionId> {
        let rooms = self.inner.read().await;
        rooms
            .get(conversation_id)
            .map(|room| room.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Deliver an event to every connection in the room, optionally skipping
    /// the originating connection. Broadcasting to an empty or absent room
    /// is a valid no-op: it means no one is currently watching. Returns the
    /// number of connections the event was queued for.
    pub async fn broadcast(
        &self,
        conversation_id: &str,
        event: &ServerEvent,
        exclude: Option<ConnectionId>,
    ) -> usize {
        let targets: Vec<(ConnectionId, EventSender)> = {
            let rooms = self.inner.read().await;
            match rooms.get(conversation_id) {
                Some(room) => room
                    .iter()
                    .filter(|(id, _)| Some(**id) != exclude)
                    .map(|(id, sender)| (*id, sender.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (connection_id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(conversation_id, %connection_id, error = %e,
                        "dropping room event for saturated connection");
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn typing(user: &str) -> ServerEvent {
        ServerEvent::TypingStart {
            conversation_id: "c1".to_string(),
            user_id: user.to_string(),
        }
    }

    #[tokio::test]
    async fn broadcast_reaches_joined_connections() {
        let rooms = RoomManager::new();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        rooms.join("c1", Uuid::new_v4(), tx_a).await;
        rooms.join("c1", Uuid::new_v4(), tx_b).await;

        let delivered = rooms.broadcast("c1", &typing("u1"), None).await;
        assert_eq!(delivered, 2);
        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_can_exclude_the_sender() {
        let rooms = RoomManager::new();
        let (tx_a, mut rx_a) = mpsc::channel(16);
        let (tx_b, mut rx_b) = mpsc::channel(16);
        let sender_conn = Uuid::new_v4();
        rooms.join("c1", sender_conn, tx_a).await;
        rooms.join("c1", Uuid::new_v4(), tx_b).await;

        let delivered = rooms.broadcast("c1", &typing("u1"), Some(sender_conn)).await;
        assert_eq!(delivered, 1);
        assert!(rx_b.recv().await.is_some());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_empty_room_is_a_noop() {
        let rooms = RoomManager::new();
        assert_eq!(rooms.broadcast("nowhere", &typing("u1"), None).await, 0);
    }

    #[tokio::test]
    async fn leave_all_clears_every_room() {
        let rooms = RoomManager::new();
        let (tx, _rx) = mpsc::channel(16);
        let conn = Uuid::new_v4();
        rooms.join("c1", conn, tx.clone()).await;
        rooms.join("c2", conn, tx).await;

        rooms.leave_all(conn).await;
        assert!(rooms.occupants("c1").await.is_empty());
        assert!(rooms.occupants("c2").await.is_empty());
    }
}

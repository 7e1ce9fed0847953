//! Typing indicators.
//!
//! Pure relay: nothing is persisted and membership is not re-checked (a
//! best-effort signal carrying no content). A start without a matching stop
//! ages out on the client. The originating connection is excluded from the
//! broadcast so a client never sees its own indicator.

use crate::events::{ConnectionId, ServerEvent};
use crate::rooms::RoomManager;

#[derive(Clone)]
pub struct TypingRelay {
    rooms: RoomManager,
}

impl TypingRelay {
    pub fn new(rooms: RoomManager) -> Self {
        Self { rooms }
    }

    pub async fn start(&self, conversation_id: &str, account_id: &str, connection_id: ConnectionId) {
        self.rooms
            .broadcast(
                conversation_id,
                &ServerEvent::TypingStart {
                    conversation_id: conversation_id.to_string(),
                    user_id: account_id.to_string(),
                },
                Some(connection_id),
            )
            .await;
    }

    pub async fn stop(&self, conversation_id: &str, account_id: &str, connection_id: ConnectionId) {
        self.rooms
            .broadcast(
                conversation_id,
                &ServerEvent::TypingStop {
                    conversation_id: conversation_id.to_string(),
                    user_id: account_id.to_string(),
                },
                Some(connection_id),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    #[tokio::test]
    async fn typing_reaches_the_room_but_not_the_typist() {
        let rooms = RoomManager::new();
        let relay = TypingRelay::new(rooms.clone());

        let typist_conn = Uuid::new_v4();
        let (tx_typist, mut rx_typist) = mpsc::channel(16);
        let (tx_other, mut rx_other) = mpsc::channel(16);
        rooms.join("c1", typist_conn, tx_typist).await;
        rooms.join("c1", Uuid::new_v4(), tx_other).await;

        relay.start("c1", "u1", typist_conn).await;
        assert_eq!(
            rx_other.recv().await.unwrap(),
            ServerEvent::TypingStart {
                conversation_id: "c1".to_string(),
                user_id: "u1".to_string(),
            }
        );
        assert!(rx_typist.try_recv().is_err());

        relay.stop("c1", "u1", typist_conn).await;
        assert!(matches!(
            rx_other.recv().await.unwrap(),
            ServerEvent::TypingStop { .. }
        ));
    }

    #[tokio::test]
    async fn typing_in_an_unjoined_room_is_a_noop() {
        let relay = TypingRelay::new(RoomManager::new());
        relay.start("nowhere", "u1", Uuid::new_v4()).await;
        relay.stop("nowhere", "u1", Uuid::new_v4()).await;
    }
}

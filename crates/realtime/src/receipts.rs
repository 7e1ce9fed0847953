//! Read receipts.
//!
//! Marking a message seen is idempotent at the store layer; the room is
//! notified only when the mark is new, so repeated `message:seen` frames
//! never produce duplicate broadcasts.

use sqlx::SqlitePool;
use tracing::debug;

use parley_store::{ConversationRepository, MessageRepository};

use crate::errors::{RealtimeError, RealtimeResult};
use crate::events::ServerEvent;
use crate::rooms::RoomManager;

#[derive(Clone)]
pub struct ReceiptTracker {
    conversations: ConversationRepository,
    messages: MessageRepository,
    rooms: RoomManager,
}

impl ReceiptTracker {
    pub fn new(pool: SqlitePool, rooms: RoomManager) -> Self {
        Self {
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            rooms,
        }
    }

    /// Record that an account has seen a message. Returns true when this is
    /// the first mark (the broadcast case), false when it was already seen.
    pub async fn mark_seen(&self, message_id: &str, account_id: &str) -> RealtimeResult<bool> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or(RealtimeError::NotFound("message"))?;

        if !self
            .conversations
            .is_member(&message.conversation_id, account_id)
            .await?
        {
            return Err(RealtimeError::Forbidden(
                "Not a member of this conversation".to_string(),
            ));
        }

        let first_mark = self.messages.mark_seen(message_id, account_id).await?;
        if !first_mark {
            return Ok(false);
        }

        let delivered = self
            .rooms
            .broadcast(
                &message.conversation_id,
                &ServerEvent::MessageSeen {
                    message_id: message_id.to_string(),
                    user_id: account_id.to_string(),
                },
                None,
            )
            .await;
        debug!(
            conversation_id = %message.conversation_id,
            message_id,
            account_id,
            delivered,
            "read receipt broadcast"
        );
        Ok(true)
    }
}

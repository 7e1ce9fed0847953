//! Message gateway: validates, persists, and broadcasts a send as one
//! logical operation.
//!
//! Membership is re-read from the store on every send so revocation takes
//! effect immediately; nothing here caches the member set. Persistence
//! failures abort before any broadcast, so an unpersisted message can never
//! reach a room.

use sqlx::SqlitePool;
use tracing::{debug, error};

use parley_store::{
    AccountRepository, Attachment, AttachmentKind, ConversationRepository, LastMessage,
    MessageKind, MessageRepository, NewMessage,
};

use crate::errors::{RealtimeError, RealtimeResult};
use crate::events::{MessageView, ServerEvent};
use crate::rooms::RoomManager;

/// Caller-supplied fields of a send. The store assigns id and timestamp.
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    pub text: Option<String>,
    pub kind: Option<MessageKind>,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone)]
pub struct MessageGateway {
    accounts: AccountRepository,
    conversations: ConversationRepository,
    messages: MessageRepository,
    rooms: RoomManager,
}

impl MessageGateway {
    pub fn new(pool: SqlitePool, rooms: RoomManager) -> Self {
        Self {
            accounts: AccountRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool),
            rooms,
        }
    }

    /// Send a message into a conversation on behalf of an account.
    ///
    /// Returns the broadcast payload so the transport layer can acknowledge
    /// the caller with a view identical to what the room received.
    pub async fn send(
        &self,
        conversation_id: &str,
        sender_account: &str,
        request: SendRequest,
    ) -> RealtimeResult<MessageView> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id)
            .await?
            .ok_or(RealtimeError::NotFound("conversation"))?;

        if !self
            .conversations
            .is_member(&conversation.id, sender_account)
            .await?
        {
            return Err(RealtimeError::Forbidden(
                "Not a member of this conversation".to_string(),
            ));
        }

        let text = request.text.filter(|t| !t.trim().is_empty());
        if text.is_none() && request.attachments.is_empty() {
            return Err(RealtimeError::Validation(
                "Message needs text or attachments".to_string(),
            ));
        }

        // The first attachment drives the effective kind when the sender
        // supplied none.
        let kind = request
            .kind
            .or_else(|| request.attachments.first().map(|a| kind_of(a.kind)))
            .unwrap_or(MessageKind::Text);

        let message = self
            .messages
            .create(NewMessage {
                conversation_id: conversation.id.clone(),
                sender_id: sender_account.to_string(),
                kind,
                text,
                attachments: request.attachments,
            })
            .await?;

        let summary = LastMessage {
            text: summary_label(message.text.as_deref(), &message.attachments),
            message_id: message.id.clone(),
            updated_at: message.created_at.clone(),
        };
        self.conversations
            .update_last_message(&conversation.id, &summary)
            .await?;

        let sender = self
            .accounts
            .find_by_id(sender_account)
            .await?
            .ok_or_else(|| RealtimeError::Internal("sender account missing".to_string()))?
            .profile();

        let view = MessageView::from_message(message, sender);

        let delivered = self
            .rooms
            .broadcast(
                &conversation.id,
                &ServerEvent::MessageNew {
                    message: view.clone(),
                },
                None,
            )
            .await;
        debug!(
            conversation_id = %conversation.id,
            message_id = %view.id,
            delivered,
            "message broadcast"
        );

        self.notify_offline_members(&conversation.id, sender_account)
            .await;

        Ok(view)
    }

    /// Push-notification hand-off for members without a live connection.
    /// Delivery is a stub: the integration point exists, nothing is sent.
    async fn notify_offline_members(&self, conversation_id: &str, sender_account: &str) {
        let member_ids = match self.conversations.member_ids(conversation_id).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(conversation_id, error = %e, "failed to resolve members for push hand-off");
                return;
            }
        };

        for member_id in member_ids {
            if member_id != sender_account {
                debug!(conversation_id, member_id, "push notification stub: skipping delivery");
            }
        }
    }
}

fn kind_of(attachment: AttachmentKind) -> MessageKind {
    match attachment {
        AttachmentKind::Image => MessageKind::Image,
        AttachmentKind::Audio => MessageKind::Audio,
        AttachmentKind::Document => MessageKind::Document,
    }
}

/// Human-readable preview for the conversation list. Plain text echoes the
/// body; an attachment-led message gets a placeholder from its first
/// attachment's kind.
fn summary_label(text: Option<&str>, attachments: &[Attachment]) -> String {
    match attachments.first() {
        Some(first) => match first.kind {
            AttachmentKind::Image => "photo".to_string(),
            AttachmentKind::Audio => "voice message".to_string(),
            AttachmentKind::Document => first
                .filename
                .clone()
                .unwrap_or_else(|| "document".to_string()),
        },
        None => text.unwrap_or_default().to_string(),
    }
}

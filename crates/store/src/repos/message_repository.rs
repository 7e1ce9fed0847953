//! Message repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::entities::{Attachment, Message, MessageKind, NewMessage};
use crate::errors::StoreResult;

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, kind, text, attachments, created_at";

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persist a message with an empty read-set. The store assigns the id
    /// and creation timestamp.
    pub async fn create(&self, fields: NewMessage) -> StoreResult<Message> {
        let id = cuid2::create_id();
        let now = Utc::now().to_rfc3339();
        let attachments = serde_json::to_string(&fields.attachments)?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, kind, text, attachments, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&fields.conversation_id)
        .bind(&fields.sender_id)
        .bind(fields.kind.as_str())
        .bind(&fields.text)
        .bind(&attachments)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Message {
            id,
            conversation_id: fields.conversation_id,
            sender_id: fields.sender_id,
            kind: fields.kind,
            text: fields.text,
            attachments: fields.attachments,
            read_by: Vec::new(),
            created_at: now,
        })
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Message>> {
        let row = sqlx::query(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut message = map_message(row)?;
        message.read_by = self.read_set(&message.id).await?;
        Ok(Some(message))
    }

    /// Append an account to a message's read-set. Returns true when the
    /// entry was actually inserted, false on an idempotent repeat.
    pub async fn mark_seen(&self, message_id: &str, account_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO message_reads (message_id, account_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_id)
        .bind(account_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn read_set(&self, message_id: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT account_id FROM message_reads WHERE message_id = ? ORDER BY read_at",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Page of messages older than the cursor, returned oldest to newest.
    /// The cursor accepts either a message id or an RFC 3339 timestamp; an
    /// unresolvable cursor is ignored.
    pub async fn list_before(
        &self,
        conversation_id: &str,
        before: Option<&str>,
        limit: i64,
    ) -> StoreResult<Vec<Message>> {
        let cutoff = match before {
            Some(cursor) => self.resolve_cursor(cursor).await?,
            None => None,
        };

        let rows = match &cutoff {
            Some(created_at) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE conversation_id = ? AND created_at < ?
                    ORDER BY created_at DESC
                    LIMIT ?
                    "#
                ))
                .bind(conversation_id)
                .bind(created_at)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    r#"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE conversation_id = ?
                    ORDER BY created_at DESC
                    LIMIT ?
                    "#
                ))
                .bind(conversation_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows.into_iter().rev() {
            let mut message = map_message(row)?;
            message.read_by = self.read_set(&message.id).await?;
            messages.push(message);
        }
        Ok(messages)
    }

    async fn resolve_cursor(&self, cursor: &str) -> StoreResult<Option<String>> {
        if DateTime::parse_from_rfc3339(cursor).is_ok() {
            return Ok(Some(cursor.to_string()));
        }

        let created_at: Option<String> =
            sqlx::query_scalar("SELECT created_at FROM messages WHERE id = ?")
                .bind(cursor)
                .fetch_optional(&self.pool)
                .await?;
        Ok(created_at)
    }
}

fn map_message(row: sqlx::sqlite::SqliteRow) -> StoreResult<Message> {
    let attachments: Vec<Attachment> =
        serde_json::from_str(&row.get::<String, _>("attachments"))?;

    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        kind: MessageKind::from(row.get::<String, _>("kind").as_str()),
        text: row.get("text"),
        attachments,
        read_by: Vec::new(),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AttachmentKind, ConversationKind};
    use crate::repos::{AccountRepository, ConversationRepository};
    use crate::test_pool;

    async fn seed_conversation(pool: &SqlitePool) -> (String, String, String) {
        let accounts = AccountRepository::new(pool.clone());
        let conversations = ConversationRepository::new(pool.clone());

        let a = accounts
            .create("Ada", "ada@example.com", "hash")
            .await
            .unwrap();
        let b = accounts
            .create("Bob", "bob@example.com", "hash")
            .await
            .unwrap();
        let conv = conversations
            .create(
                ConversationKind::Direct,
                None,
                &[a.id.clone(), b.id.clone()],
            )
            .await
            .unwrap();
        (conv.id, a.id, b.id)
    }

    fn text_message(conversation_id: &str, sender_id: &str, text: &str) -> NewMessage {
        NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            kind: MessageKind::Text,
            text: Some(text.to_string()),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_persists_message_with_empty_read_set() {
        let pool = test_pool().await;
        let repo = MessageRepository::new(pool.clone());
        let (conv_id, sender, _) = seed_conversation(&pool).await;

        let message = repo
            .create(text_message(&conv_id, &sender, "hi"))
            .await
            .unwrap();
        assert_eq!(message.text.as_deref(), Some("hi"));
        assert!(message.read_by.is_empty());

        let reloaded = repo.find_by_id(&message.id).await.unwrap().unwrap();
        assert_eq!(reloaded.sender_id, sender);
        assert!(reloaded.read_by.is_empty());
    }

    #[tokio::test]
    async fn attachments_survive_persistence() {
        let pool = test_pool().await;
        let repo = MessageRepository::new(pool.clone());
        let (conv_id, sender, _) = seed_conversation(&pool).await;

        let attachment = Attachment {
            url: "/uploads/voice.ogg".to_string(),
            kind: AttachmentKind::Audio,
            filename: Some("voice.ogg".to_string()),
            size: Some(2048),
            mime_type: Some("audio/ogg".to_string()),
        };
        let message = repo
            .create(NewMessage {
                conversation_id: conv_id,
                sender_id: sender,
                kind: MessageKind::Audio,
                text: None,
                attachments: vec![attachment.clone()],
            })
            .await
            .unwrap();

        let reloaded = repo.find_by_id(&message.id).await.unwrap().unwrap();
        assert_eq!(reloaded.attachments, vec![attachment]);
        assert_eq!(reloaded.kind, MessageKind::Audio);
    }

    #[tokio::test]
    async fn mark_seen_is_idempotent() {
        let pool = test_pool().await;
        let repo = MessageRepository::new(pool.clone());
        let (conv_id, sender, reader) = seed_conversation(&pool).await;

        let message = repo
            .create(text_message(&conv_id, &sender, "hi"))
            .await
            .unwrap();

        assert!(repo.mark_seen(&message.id, &reader).await.unwrap());
        assert!(!repo.mark_seen(&message.id, &reader).await.unwrap());

        let read_by = repo.read_set(&message.id).await.unwrap();
        assert_eq!(read_by, vec![reader]);
    }

    #[tokio::test]
    async fn list_before_pages_oldest_to_newest() {
        let pool = test_pool().await;
        let repo = MessageRepository::new(pool.clone());
        let (conv_id, sender, _) = seed_conversation(&pool).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let message = repo
                .create(text_message(&conv_id, &sender, &format!("m{i}")))
                .await
                .unwrap();
            ids.push(message.id);
            // keep created_at strictly increasing for the cursor assertions
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let newest = repo.list_before(&conv_id, None, 3).await.unwrap();
        let texts: Vec<_> = newest.iter().map(|m| m.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["m2", "m3", "m4"]);

        // Cursor by message id.
        let older = repo
            .list_before(&conv_id, Some(&ids[2]), 10)
            .await
            .unwrap();
        let texts: Vec<_> = older.iter().map(|m| m.text.clone().unwrap()).collect();
        assert_eq!(texts, vec!["m0", "m1"]);

        // Unknown cursor is ignored.
        let all = repo
            .list_before(&conv_id, Some("missing-id"), 10)
            .await
            .unwrap();
        assert_eq!(all.len(), 5);
    }
}

//! Conversation repository for database operations.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::entities::{
    Conversation, ConversationKind, ConversationMember, LastMessage, MemberRole,
};
use crate::errors::{StoreError, StoreResult};

const CONVERSATION_COLUMNS: &str = "id, kind, title, avatar_url, last_message_text, \
     last_message_id, last_message_at, created_at, updated_at";

#[derive(Clone)]
pub struct ConversationRepository {
    pool: SqlitePool,
}

impl ConversationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a conversation with its initial member set. Repeated ids
    /// collapse to one member, so a direct conversation must name exactly
    /// two distinct members.
    pub async fn create(
        &self,
        kind: ConversationKind,
        title: Option<&str>,
        member_ids: &[String],
    ) -> StoreResult<Conversation> {
        let mut members: Vec<&String> = Vec::with_capacity(member_ids.len());
        for member_id in member_ids {
            if !members.contains(&member_id) {
                members.push(member_id);
            }
        }

        if kind == ConversationKind::Direct && members.len() != 2 {
            return Err(StoreError::DirectMemberLimit);
        }

        let id = cuid2::create_id();
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO conversations (id, kind, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(kind.as_str())
        .bind(title.filter(|_| kind == ConversationKind::Group))
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for member_id in members {
            sqlx::query(
                "INSERT INTO conversation_members (conversation_id, account_id, role, joined_at) VALUES (?, ?, 'member', ?)",
            )
            .bind(&id)
            .bind(member_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.find_by_id(&id)
            .await?
            .ok_or_else(|| StoreError::Connection("created conversation missing".to_string()))
    }

    pub async fn find_by_id(&self, id: &str) -> StoreResult<Option<Conversation>> {
        let row = sqlx::query(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_conversation))
    }

    pub async fn members_of(&self, id: &str) -> StoreResult<Vec<ConversationMember>> {
        let rows = sqlx::query(
            "SELECT account_id, role FROM conversation_members WHERE conversation_id = ? ORDER BY joined_at",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationMember {
                account_id: row.get("account_id"),
                role: MemberRole::from(row.get::<String, _>("role").as_str()),
            })
            .collect())
    }

    pub async fn member_ids(&self, id: &str) -> StoreResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT account_id FROM conversation_members WHERE conversation_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Membership check, re-read on every call so revocation takes effect
    /// immediately.
    pub async fn is_member(&self, id: &str, account_id: &str) -> StoreResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM conversation_members WHERE conversation_id = ? AND account_id = ?",
        )
        .bind(id)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    /// Add a member. Direct conversations never grow past two members.
    pub async fn add_member(&self, id: &str, account_id: &str) -> StoreResult<()> {
        let conversation = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| sqlx::Error::RowNotFound)?;

        if conversation.is_direct() {
            return Err(StoreError::DirectMemberLimit);
        }
        if self.is_member(id, account_id).await? {
            return Err(StoreError::AlreadyMember);
        }

        sqlx::query(
            "INSERT INTO conversation_members (conversation_id, account_id, role, joined_at) VALUES (?, ?, 'member', ?)",
        )
        .bind(id)
        .bind(account_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Conversations the account belongs to, most recently touched first.
    pub async fn list_for_account(&self, account_id: &str) -> StoreResult<Vec<Conversation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM conversations c
            JOIN conversation_members cm ON cm.conversation_id = c.id
            WHERE cm.account_id = ?
            ORDER BY c.updated_at DESC
            "#
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_conversation).collect())
    }

    /// The direct conversation between two accounts, if one exists.
    pub async fn find_direct_between(
        &self,
        account_id: &str,
        other_id: &str,
    ) -> StoreResult<Option<Conversation>> {
        // Identical ids would satisfy both EXISTS clauses through the same
        // member row and match any of the account's direct conversations.
        if account_id == other_id {
            return Ok(None);
        }

        let row = sqlx::query(&format!(
            r#"
            SELECT {CONVERSATION_COLUMNS} FROM conversations c
            WHERE c.kind = 'direct'
              AND EXISTS (SELECT 1 FROM conversation_members m
                          WHERE m.conversation_id = c.id AND m.account_id = ?)
              AND EXISTS (SELECT 1 FROM conversation_members m
                          WHERE m.conversation_id = c.id AND m.account_id = ?)
            "#
        ))
        .bind(account_id)
        .bind(other_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_conversation))
    }

    /// Overwrite the denormalized last-message summary.
    pub async fn update_last_message(
        &self,
        id: &str,
        summary: &LastMessage,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE conversations
            SET last_message_text = ?, last_message_id = ?, last_message_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&summary.text)
        .bind(&summary.message_id)
        .bind(&summary.updated_at)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn map_conversation(row: sqlx::sqlite::SqliteRow) -> Conversation {
    let last_message = match (
        row.get::<Option<String>, _>("last_message_text"),
        row.get::<Option<String>, _>("last_message_id"),
        row.get::<Option<String>, _>("last_message_at"),
    ) {
        (Some(text), Some(message_id), Some(updated_at)) => Some(LastMessage {
            text,
            message_id,
            updated_at,
        }),
        _ => None,
    };

    Conversation {
        id: row.get("id"),
        kind: ConversationKind::from(row.get::<String, _>("kind").as_str()),
        title: row.get("title"),
        avatar_url: row.get("avatar_url"),
        last_message,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

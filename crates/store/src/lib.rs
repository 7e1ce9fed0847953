//! # Parley Store
//!
//! SQLite persistence for the Parley chat backend: accounts and the contact
//! graph, conversations with their denormalized last-message summary, and
//! messages with append-only read-sets. Every operation applies atomically
//! per document; callers that need cross-document atomicity sequence their
//! own calls.

use sqlx::SqlitePool;

use parley_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod errors;
pub mod migrations;
pub mod repos;

pub use connection::prepare_database;
pub use entities::{
    Account, Attachment, AttachmentKind, Contact, Conversation, ConversationKind,
    ConversationMember, LastMessage, MemberRole, Message, MessageKind, NewMessage, Profile,
};
pub use errors::{StoreError, StoreResult};
pub use migrations::run_migrations;
pub use repos::{AccountRepository, ConversationRepository, MessageRepository};

/// Open the pool and bring the schema up to date.
pub async fn initialize_store(config: &DatabaseConfig) -> StoreResult<SqlitePool> {
    let pool = prepare_database(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// In-memory pool with the full schema, for tests.
#[doc(hidden)]
pub async fn test_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    initialize_store(&config)
        .await
        .expect("in-memory store should initialize")
}

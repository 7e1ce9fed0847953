//! Error types for the store.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("email already registered")]
    EmailTaken,

    #[error("already in contacts")]
    AlreadyContact,

    #[error("already a member")]
    AlreadyMember,

    #[error("direct conversations hold exactly two members")]
    DirectMemberLimit,
}

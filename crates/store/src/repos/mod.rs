//! Repository implementations over the SQLite pool.

pub mod account_repository;
pub mod conversation_repository;
pub mod message_repository;

pub use account_repository::AccountRepository;
pub use conversation_repository::ConversationRepository;
pub use message_repository::MessageRepository;

//! Domain entities persisted by the store.

pub mod account;
pub mod conversation;
pub mod message;

pub use account::{Account, Contact, Profile};
pub use conversation::{
    Conversation, ConversationKind, ConversationMember, LastMessage, MemberRole,
};
pub use message::{Attachment, AttachmentKind, Message, MessageKind, NewMessage};

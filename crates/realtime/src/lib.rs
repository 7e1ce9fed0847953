//! # Parley Realtime
//!
//! The fanout and presence core: who is connected, which conversations they
//! are watching, and how persisted chat activity reaches them. Transports
//! (websocket handlers, REST routes) sit above this crate and own framing;
//! everything here speaks typed events over per-connection queues.
//!
//! Delivery is at-most-once to live connections. Nothing is queued for
//! offline accounts; clients recover missed activity by fetching history.

pub mod errors;
pub mod events;
pub mod gateway;
pub mod presence;
pub mod receipts;
pub mod registry;
pub mod rooms;
pub mod typing;

pub use errors::{RealtimeError, RealtimeResult};
pub use events::{ClientEvent, ConnectionId, MessageView, ServerEvent};
pub use gateway::{MessageGateway, SendRequest};
pub use presence::PresenceService;
pub use receipts::ReceiptTracker;
pub use registry::{ConnectionRegistry, EventSender};
pub use rooms::RoomManager;
pub use typing::TypingRelay;

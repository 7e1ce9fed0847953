//! Connection registry: account id -> live connections.
//!
//! Multiple simultaneous connections per account are first-class
//! (multi-device). Mutations serialize on one lock; fanout reads clone a
//! snapshot of the outbound senders so a concurrent add/remove cannot
//! corrupt an in-flight delivery loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::warn;

use crate::events::{ConnectionId, ServerEvent};

/// Outbound queue handle of one connection.
pub type EventSender = mpsc::Sender<ServerEvent>;

type AccountConnections = HashMap<String, HashMap<ConnectionId, EventSender>>;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<AccountConnections>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. Returns true when this is the account's first
    /// live connection (the presence ONLINE edge). Computed inside the same
    /// critical section as the insert so concurrent connects of one account
    /// cannot both observe an empty bucket.
    pub async fn add(
        &self,
        account_id: &str,
        connection_id: ConnectionId,
        sender: EventSender,
    ) -> bool {
        let mut map = self.inner.write().await;
        let bucket = map.entry(account_id.to_string()).or_default();
        let was_empty = bucket.is_empty();
        bucket.insert(connection_id, sender);
        was_empty
    }

    /// Remove a connection. Removing one that is not present is a no-op.
    /// Returns true when the account's bucket became empty (the presence
    /// OFFLINE edge).
    pub async fn remove(&self, account_id: &str, connection_id: ConnectionId) -> bool {
        let mut map = self.inner.write().await;
        let Some(bucket) = map.get_mut(account_id) else {
            return false;
        };
        if bucket.remove(&connection_id).is_none() {
            return false;
        }
        if bucket.is_empty() {
            map.remove(account_id);
            return true;
        }
        false
    }

    /// Ids of the account's live connections.
    pub async fn list(&self, account_id: &str) -> Vec<ConnectionId> {
        let map = self.inner.read().await;
        map.get(account_id)
            .map(|bucket| bucket.keys().copied().collect())
            .unwrap_or_default()
    }

    pub async fn is_online(&self, account_id: &str) -> bool {
        let map = self.inner.read().await;
        map.get(account_id).is_some_and(|bucket| !bucket.is_empty())
    }

    /// Deliver an event to every live connection of an account. Accounts
    /// with no connections are silently skipped; so are connections whose
    /// outbound queue is full (delivery never blocks on a slow consumer).
    pub async fn send_to_account(&self, account_id: &str, event: &ServerEvent) {
        let senders: Vec<EventSender> = {
            let map = self.inner.read().await;
            match map.get(account_id) {
                Some(bucket) => bucket.values().cloned().collect(),
                None => return,
            }
        };

        for sender in senders {
            if let Err(e) = sender.try_send(event.clone()) {
                warn!(account_id, error = %e, "dropping event for saturated connection");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn channel() -> (EventSender, mpsc::Receiver<ServerEvent>) {
        mpsc::channel(16)
    }

    #[tokio::test]
    async fn first_add_and_last_remove_report_edges() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();

        assert!(registry.add("u1", conn_a, tx_a).await);
        assert!(!registry.add("u1", conn_b, tx_b).await);
        assert_eq!(registry.list("u1").await.len(), 2);

        assert!(!registry.remove("u1", conn_a).await);
        assert!(registry.remove("u1", conn_b).await);
        assert!(!registry.is_online("u1").await);
    }

    #[tokio::test]
    async fn removing_unknown_connection_is_a_noop() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let conn = Uuid::new_v4();

        assert!(!registry.remove("u1", conn).await);

        registry.add("u1", conn, tx).await;
        assert!(!registry.remove("u1", Uuid::new_v4()).await);
        assert_eq!(registry.list("u1").await, vec![conn]);
    }

    #[tokio::test]
    async fn send_to_account_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();
        registry.add("u1", Uuid::new_v4(), tx_a).await;
        registry.add("u1", Uuid::new_v4(), tx_b).await;

        let event = ServerEvent::ContactOnline {
            user_id: "u2".to_string(),
        };
        registry.send_to_account("u1", &event).await;

        assert_eq!(rx_a.recv().await.unwrap(), event);
        assert_eq!(rx_b.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn send_to_absent_account_is_silent() {
        let registry = ConnectionRegistry::new();
        registry
            .send_to_account(
                "ghost",
                &ServerEvent::ContactOnline {
                    user_id: "u1".to_string(),
                },
            )
            .await;
    }
}

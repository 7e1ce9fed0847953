//! Presence: online/offline transitions with contact-scoped fanout.
//!
//! Per-account state machine: OFFLINE -> ONLINE on the first connection,
//! ONLINE -> OFFLINE only when the live connection set becomes empty. The
//! contact list is re-read from the store at each transition, so visibility
//! always reflects the graph at that moment; historical flips are never
//! replayed to later contacts.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, error};

use parley_store::AccountRepository;

use crate::errors::RealtimeResult;
use crate::events::{ConnectionId, ServerEvent};
use crate::registry::{ConnectionRegistry, EventSender};

#[derive(Clone)]
pub struct PresenceService {
    registry: ConnectionRegistry,
    accounts: AccountRepository,
}

impl PresenceService {
    pub fn new(registry: ConnectionRegistry, pool: SqlitePool) -> Self {
        Self {
            registry,
            accounts: AccountRepository::new(pool),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Track a new connection. Flips the account online and notifies its
    /// contacts when this is the first live connection.
    pub async fn connect(
        &self,
        account_id: &str,
        connection_id: ConnectionId,
        sender: EventSender,
    ) -> RealtimeResult<()> {
        let came_online = self.registry.add(account_id, connection_id, sender).await;
        if !came_online {
            return Ok(());
        }

        if let Err(e) = self.accounts.set_online(account_id).await {
            // The caller drops the socket on a failed connect; a stale entry
            // would pin the account online and leave fanout targeting a dead
            // channel.
            self.registry.remove(account_id, connection_id).await;
            return Err(e.into());
        }
        debug!(account_id, "account online");

        self.fan_out_to_contacts(
            account_id,
            &ServerEvent::ContactOnline {
                user_id: account_id.to_string(),
            },
        )
        .await;
        Ok(())
    }

    /// Untrack a connection. Flips the account offline, stamps last-seen,
    /// and notifies contacts when the live connection set became empty.
    pub async fn disconnect(
        &self,
        account_id: &str,
        connection_id: ConnectionId,
    ) -> RealtimeResult<()> {
        let went_offline = self.registry.remove(account_id, connection_id).await;
        if !went_offline {
            return Ok(());
        }

        let last_seen = Utc::now().to_rfc3339();
        self.accounts.set_offline(account_id, &last_seen).await?;
        debug!(account_id, %last_seen, "account offline");

        self.fan_out_to_contacts(
            account_id,
            &ServerEvent::ContactOffline {
                user_id: account_id.to_string(),
                last_seen,
            },
        )
        .await;
        Ok(())
    }

    /// Deliver a presence event to the live connections of every account
    /// holding this one as a contact. Audience members with no connections
    /// are silently skipped: no queuing, no retry. The transition itself has
    /// already committed, so a failed audience read is logged, not surfaced.
    async fn fan_out_to_contacts(&self, account_id: &str, event: &ServerEvent) {
        let audience = match self.accounts.audience_of(account_id).await {
            Ok(audience) => audience,
            Err(e) => {
                error!(account_id, error = %e, "failed to resolve presence audience");
                return;
            }
        };
        for contact_id in &audience {
            self.registry.send_to_account(contact_id, event).await;
        }
    }
}

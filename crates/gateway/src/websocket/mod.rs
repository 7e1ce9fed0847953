//! Websocket transport.
//!
//! One long-lived connection per client. The handshake authenticates via a
//! `?token=` query parameter and rejects with 401 before the upgrade, so an
//! unauthenticated socket never processes an event.
//!
//! After the upgrade the socket splits: a writer task drains the
//! connection's outbound queue, while inbound frames are handled inline on
//! this task so events from one connection apply in the order they were
//! sent. Domain errors become error/ack events on the same connection and
//! never tear it down.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_realtime::{ClientEvent, ConnectionId, EventSender, RealtimeError, SendRequest, ServerEvent};
use parley_store::Account;

use crate::error::ApiError;
use crate::state::AppState;

/// Outbound queue depth per connection. A consumer that falls this far
/// behind starts losing events; history fills the gap on reconnect.
const OUTBOUND_QUEUE: usize = 256;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Result<Response, ApiError> {
    let token = query
        .token
        .ok_or_else(|| ApiError::unauthorized("missing token"))?;
    let account = state
        .authenticator
        .verify(&token)
        .await
        .map_err(|_| ApiError::unauthorized("invalid token"))?;

    Ok(ws.on_upgrade(move |socket| run_session(socket, state, account)))
}

async fn run_session(socket: WebSocket, state: AppState, account: Account) {
    let connection_id = Uuid::new_v4();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_QUEUE);
    let (mut sink, mut stream) = socket.split();

    if let Err(e) = state
        .presence
        .connect(&account.id, connection_id, outbound_tx.clone())
        .await
    {
        error!(account_id = %account.id, error = %e, "presence connect failed");
        return;
    }
    info!(account_id = %account.id, %connection_id, "realtime session open");

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!(error = %e, "failed to serialize outbound event"),
            }
        }
    });

    while let Some(frame) = stream.next().await {
        let Ok(frame) = frame else { break };
        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => {
                    handle_event(&state, &account, connection_id, &outbound_tx, event).await;
                }
                Err(e) => {
                    debug!(account_id = %account.id, error = %e, "malformed client event");
                    queue(
                        &outbound_tx,
                        ServerEvent::Error {
                            error: "validation".to_string(),
                            message: "malformed event payload".to_string(),
                        },
                    );
                }
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.rooms.leave_all(connection_id).await;
    if let Err(e) = state.presence.disconnect(&account.id, connection_id).await {
        error!(account_id = %account.id, error = %e, "presence disconnect failed");
    }
    writer.abort();
    info!(account_id = %account.id, %connection_id, "realtime session closed");
}

async fn handle_event(
    state: &AppState,
    account: &Account,
    connection_id: ConnectionId,
    outbound: &EventSender,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            match state
                .conversations
                .is_member(&conversation_id, &account.id)
                .await
            {
                Ok(true) => {
                    state
                        .rooms
                        .join(&conversation_id, connection_id, outbound.clone())
                        .await;
                    queue(outbound, ServerEvent::Joined { conversation_id });
                }
                Ok(false) => queue_error(
                    outbound,
                    &RealtimeError::Forbidden("Not a member of this conversation".to_string()),
                ),
                Err(e) => queue_error(outbound, &e.into()),
            }
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            state.rooms.leave(&conversation_id, connection_id).await;
            queue(outbound, ServerEvent::Left { conversation_id });
        }
        ClientEvent::TypingStart { conversation_id } => {
            state
                .typing
                .start(&conversation_id, &account.id, connection_id)
                .await;
        }
        ClientEvent::TypingStop { conversation_id } => {
            state
                .typing
                .stop(&conversation_id, &account.id, connection_id)
                .await;
        }
        ClientEvent::MessageSend {
            conversation_id,
            text,
            kind,
            attachments,
        } => {
            let request = SendRequest {
                text,
                kind,
                attachments,
            };
            let ack = match state.gateway.send(&conversation_id, &account.id, request).await {
                Ok(view) => ServerEvent::MessageAck {
                    ok: true,
                    message: Some(view),
                    error: None,
                },
                Err(e) => {
                    if matches!(e, RealtimeError::Internal(_)) {
                        error!(account_id = %account.id, error = %e, "message send failed");
                    }
                    ServerEvent::MessageAck {
                        ok: false,
                        message: None,
                        error: Some(e.public_message()),
                    }
                }
            };
            queue(outbound, ack);
        }
        ClientEvent::MessageSeen { message_id, .. } => {
            if let Err(e) = state.receipts.mark_seen(&message_id, &account.id).await {
                if matches!(e, RealtimeError::Internal(_)) {
                    error!(account_id = %account.id, error = %e, "mark seen failed");
                }
                queue_error(outbound, &e);
            }
        }
    }
}

fn queue(outbound: &EventSender, event: ServerEvent) {
    if let Err(e) = outbound.try_send(event) {
        warn!(error = %e, "dropping event for saturated connection");
    }
}

fn queue_error(outbound: &EventSender, error: &RealtimeError) {
    queue(
        outbound,
        ServerEvent::Error {
            error: error.code().to_string(),
            message: error.public_message(),
        },
    );
}

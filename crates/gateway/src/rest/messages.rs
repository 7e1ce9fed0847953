//! Message history, REST sends, and read receipts.
//!
//! REST sends go through the same gateway as websocket sends, so they also
//! broadcast to the conversation's room.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use parley_realtime::{MessageView, SendRequest};
use parley_store::{Attachment, MessageKind, Profile};

use crate::error::ApiError;
use crate::state::{AppState, CurrentAccount};

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<MessageKind>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub before: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeenRequest {
    pub message_id: String,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageView>,
}

pub async fn send(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Path(conversation_id): Path<String>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageView>), ApiError> {
    let view = state
        .gateway
        .send(
            &conversation_id,
            &caller.id,
            SendRequest {
                text: payload.text,
                kind: payload.kind,
                attachments: payload.attachments,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Page of history older than the `before` cursor (message id or RFC 3339
/// timestamp), returned oldest to newest with senders resolved to profiles.
pub async fn history(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    state
        .conversations
        .find_by_id(&conversation_id)
        .await?
        .ok_or_else(|| ApiError::not_found("conversation not found"))?;

    if !state
        .conversations
        .is_member(&conversation_id, &caller.id)
        .await?
    {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "not a member of this conversation",
        ));
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let messages = state
        .messages
        .list_before(&conversation_id, query.before.as_deref(), limit)
        .await?;

    let mut profiles: HashMap<String, Profile> = HashMap::new();
    let mut views = Vec::with_capacity(messages.len());
    for message in messages {
        let sender = match profiles.get(&message.sender_id) {
            Some(profile) => profile.clone(),
            None => {
                let account = state
                    .accounts
                    .find_by_id(&message.sender_id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
                    })?;
                let profile = account.profile();
                profiles.insert(message.sender_id.clone(), profile.clone());
                profile
            }
        };
        views.push(MessageView::from_message(message, sender));
    }

    Ok(Json(HistoryResponse { messages: views }))
}

pub async fn mark_seen(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Path(_conversation_id): Path<String>,
    Json(payload): Json<SeenRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = state
        .receipts
        .mark_seen(&payload.message_id, &caller.id)
        .await?;
    Ok(Json(json!({ "ok": true, "updated": updated })))
}

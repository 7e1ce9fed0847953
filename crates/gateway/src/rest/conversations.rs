//! Conversation endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_store::{Conversation, ConversationKind, LastMessage, Profile};

use crate::error::ApiError;
use crate::state::{AppState, CurrentAccount};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateConversationRequest {
    #[serde(default = "default_kind")]
    pub kind: ConversationKind,
    #[serde(default)]
    pub title: Option<String>,
    pub member_ids: Vec<String>,
}

fn default_kind() -> ConversationKind {
    ConversationKind::Direct
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    pub id: String,
    pub kind: ConversationKind,
    pub title: Option<String>,
    pub avatar_url: Option<String>,
    pub last_message: Option<LastMessage>,
    pub members: Vec<Profile>,
    pub created_at: String,
    pub updated_at: String,
}

pub async fn create(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationView>), ApiError> {
    let mut member_ids = payload.member_ids;
    if !member_ids.contains(&caller.id) {
        member_ids.push(caller.id.clone());
    }

    // A direct pair that already has its conversation gets it back instead
    // of a duplicate.
    if payload.kind == ConversationKind::Direct && member_ids.len() == 2 {
        if let Some(existing) = state
            .conversations
            .find_direct_between(&member_ids[0], &member_ids[1])
            .await?
        {
            let view = view_of(&state, existing).await?;
            return Ok((StatusCode::OK, Json(view)));
        }
    }

    let conversation = state
        .conversations
        .create(payload.kind, payload.title.as_deref(), &member_ids)
        .await?;

    let view = view_of(&state, conversation).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// The caller's conversations, most recently active first. Direct
/// conversations with a removed contact are filtered out.
pub async fn list(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
) -> Result<Json<Vec<ConversationView>>, ApiError> {
    let conversations = state.conversations.list_for_account(&caller.id).await?;

    let mut views = Vec::with_capacity(conversations.len());
    for conversation in conversations {
        let view = view_of(&state, conversation).await?;
        if view.kind == ConversationKind::Direct {
            let other = view.members.iter().find(|member| member.id != caller.id);
            match other {
                Some(other) if state.accounts.are_contacts(&caller.id, &other.id).await? => {}
                _ => continue,
            }
        }
        views.push(view);
    }

    Ok(Json(views))
}

pub async fn add_member(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Path(conversation_id): Path<String>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<Json<Vec<Profile>>, ApiError> {
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

    state
        .conversations
        .add_member(&conversation_id, &payload.account_id)
        .await?;

    let members = member_profiles(&state, &conversation_id).await?;
    Ok(Json(members))
}

async fn view_of(state: &AppState, conversation: Conversation) -> Result<ConversationView, ApiError> {
    let members = member_profiles(state, &conversation.id).await?;
    Ok(ConversationView {
        id: conversation.id,
        kind: conversation.kind,
        title: conversation.title,
        avatar_url: conversation.avatar_url,
        last_message: conversation.last_message,
        members,
        created_at: conversation.created_at,
        updated_at: conversation.updated_at,
    })
}

async fn member_profiles(state: &AppState, conversation_id: &str) -> Result<Vec<Profile>, ApiError> {
    let member_ids = state.conversations.member_ids(conversation_id).await?;
    let mut profiles = Vec::with_capacity(member_ids.len());
    for member_id in member_ids {
        if let Some(account) = state.accounts.find_by_id(&member_id).await? {
            profiles.push(account.profile());
        }
    }
    Ok(profiles)
}

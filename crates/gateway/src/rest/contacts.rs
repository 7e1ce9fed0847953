//! Contact graph endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_store::{Contact, ConversationKind};

use crate::error::ApiError;
use crate::state::{AppState, CurrentAccount};

#[derive(Debug, Deserialize)]
pub struct AddContactRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddContactResponse {
    pub contact: Contact,
    pub conversation_id: String,
}

/// Add a mutual contact by email and ensure the direct conversation between
/// the pair exists.
pub async fn add_contact(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
    Json(payload): Json<AddContactRequest>,
) -> Result<(StatusCode, Json<AddContactResponse>), ApiError> {
    let target = state
        .accounts
        .find_by_email(&payload.email)
        .await?
        .ok_or_else(|| ApiError::not_found("no account with that email"))?;

    if target.id == caller.id {
        return Err(ApiError::bad_request("cannot add yourself as a contact"));
    }

    state.accounts.add_contact(&caller.id, &target.id).await?;

    let conversation = match state
        .conversations
        .find_direct_between(&caller.id, &target.id)
        .await?
    {
        Some(existing) => existing,
        None => {
            state
                .conversations
                .create(
                    ConversationKind::Direct,
                    None,
                    &[caller.id.clone(), target.id.clone()],
                )
                .await?
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(AddContactResponse {
            contact: Contact {
                id: target.id,
                name: target.name,
                email: target.email,
                avatar_url: target.avatar_url,
                is_online: target.is_online,
                last_seen: target.last_seen,
            },
            conversation_id: conversation.id,
        }),
    ))
}

pub async fn list_contacts(
    State(state): State<AppState>,
    CurrentAccount(caller): CurrentAccount,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = state.accounts.contacts_of(&caller.id).await?;
    Ok(Json(contacts))
}

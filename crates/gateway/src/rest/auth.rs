//! Registration, login, and account lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use parley_store::{Account, Contact};

use crate::error::ApiError;
use crate::state::{AppState, CurrentAccount};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// An account as returned to its owner. Never includes the password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub is_online: bool,
    pub last_seen: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            name: account.name,
            email: account.email,
            avatar_url: account.avatar_url,
            is_online: account.is_online,
            last_seen: account.last_seen,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: AccountView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountWithContacts {
    #[serde(flatten)]
    pub user: AccountView,
    pub contacts: Vec<Contact>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let name = payload.name.trim();
    if name.is_empty() || payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("name, email, and password are required"));
    }

    let (token, account) = state
        .authenticator
        .register(name, &payload.email, &payload.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: account.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (token, account) = state
        .authenticator
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(SessionResponse {
        token,
        user: account.into(),
    }))
}

pub async fn account_by_email(
    State(state): State<AppState>,
    CurrentAccount(_caller): CurrentAccount,
    Path(email): Path<String>,
) -> Result<Json<AccountWithContacts>, ApiError> {
    let account = state
        .accounts
        .find_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("account not found"))?;

    let contacts = state.accounts.contacts_of(&account.id).await?;
    Ok(Json(AccountWithContacts {
        user: account.into(),
        contacts,
    }))
}

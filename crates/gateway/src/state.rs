//! Shared application state: one instance of every service, cloned into
//! each handler.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sqlx::SqlitePool;

use parley_auth::Authenticator;
use parley_config::AuthConfig;
use parley_realtime::{
    ConnectionRegistry, MessageGateway, PresenceService, ReceiptTracker, RoomManager, TypingRelay,
};
use parley_store::{AccountRepository, ConversationRepository, MessageRepository};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub authenticator: Authenticator,
    pub accounts: AccountRepository,
    pub conversations: ConversationRepository,
    pub messages: MessageRepository,
    pub registry: ConnectionRegistry,
    pub rooms: RoomManager,
    pub presence: PresenceService,
    pub gateway: MessageGateway,
    pub receipts: ReceiptTracker,
    pub typing: TypingRelay,
}

impl AppState {
    pub fn new(pool: SqlitePool, auth_config: &AuthConfig) -> Self {
        let registry = ConnectionRegistry::new();
        let rooms = RoomManager::new();

        Self {
            authenticator: Authenticator::new(pool.clone(), auth_config),
            accounts: AccountRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            presence: PresenceService::new(registry.clone(), pool.clone()),
            gateway: MessageGateway::new(pool.clone(), rooms.clone()),
            receipts: ReceiptTracker::new(pool.clone(), rooms.clone()),
            typing: TypingRelay::new(rooms.clone()),
            registry,
            rooms,
            pool,
        }
    }
}

/// The account behind the request's bearer token. Extracting it rejects the
/// request with 401 when the token is missing or invalid.
pub struct CurrentAccount(pub parley_store::Account);

#[async_trait]
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = bearer_token(&parts.headers)?;
        let account = state
            .authenticator
            .verify(&token)
            .await
            .map_err(|_| ApiError::unauthorized("invalid token"))?;
        Ok(CurrentAccount(account))
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_case_insensitive_on_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer TOKEN123"));

        let token = bearer_token(&headers).expect("token should be extracted");
        assert_eq!(token, "TOKEN123");
    }

    #[test]
    fn bearer_token_rejects_missing_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer"));

        let error = bearer_token(&headers).expect_err("should reject missing token");
        assert_eq!(error.status(), axum::http::StatusCode::UNAUTHORIZED);
    }
}

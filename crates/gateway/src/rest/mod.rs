//! REST routes.

pub mod auth;
pub mod contacts;
pub mod conversations;
pub mod health;
pub mod messages;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/:email", get(auth::account_by_email))
        .route("/api/add", post(contacts::add_contact))
        .route("/api/", get(contacts::list_contacts))
        .route(
            "/api/conversations",
            post(conversations::create).get(conversations::list),
        )
        .route(
            "/api/conversations/:id/members",
            post(conversations::add_member),
        )
        .route(
            "/api/:conversation_id/messages",
            post(messages::send).get(messages::history),
        )
        .route("/api/:conversation_id/seen", post(messages::mark_seen))
}

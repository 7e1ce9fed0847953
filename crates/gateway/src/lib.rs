//! # Parley Gateway
//!
//! HTTP and websocket transport for the Parley chat backend. REST routes
//! cover auth, contacts, conversations, and message history; the websocket
//! endpoint carries the realtime event protocol. Both paths dispatch into
//! the same realtime services, so a REST send broadcasts exactly like a
//! websocket send.

pub mod error;
pub mod rest;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use state::{AppState, CurrentAccount};

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

/// Assemble the full application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .merge(rest::routes())
        .route("/ws", get(websocket::websocket_handler))
        .with_state(state)
        .layer(cors)
}

//! Error taxonomy for the realtime subsystem.
//!
//! Every kind except `Internal` is surfaced to the originating caller as a
//! structured error event; `Internal` is logged server-side and surfaced as
//! an opaque failure. None of them tear down the connection.

use thiserror::Error;

use parley_store::StoreError;

pub type RealtimeResult<T> = Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RealtimeError {
    /// Stable machine-readable code carried on error events.
    pub fn code(&self) -> &'static str {
        match self {
            RealtimeError::Unauthorized => "unauthorized",
            RealtimeError::NotFound(_) => "not_found",
            RealtimeError::Forbidden(_) => "forbidden",
            RealtimeError::Validation(_) => "validation",
            RealtimeError::Internal(_) => "internal",
        }
    }

    /// Message safe to show the caller. Internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            RealtimeError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for RealtimeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DirectMemberLimit | StoreError::AlreadyMember | StoreError::AlreadyContact => {
                RealtimeError::Validation(err.to_string())
            }
            other => RealtimeError::Internal(other.to_string()),
        }
    }
}

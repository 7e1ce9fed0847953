//! HTTP error surface.
//!
//! Every domain error funnels into one response type so handlers can use
//! `?` throughout. Internal failures are logged here and returned opaque.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use parley_auth::AuthError;
use parley_realtime::RealtimeError;
use parley_store::StoreError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::EmailTaken => Self::conflict("email already registered"),
            AuthError::InvalidCredentials => Self::unauthorized("invalid credentials"),
            AuthError::InvalidToken => Self::unauthorized("invalid token"),
            AuthError::PasswordHash(_) | AuthError::Store(_) => {
                error!(error = %value, "auth failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::EmailTaken => Self::conflict("email already registered"),
            StoreError::AlreadyContact => Self::conflict("already a contact"),
            StoreError::AlreadyMember => Self::conflict("already a member"),
            StoreError::DirectMemberLimit => {
                Self::bad_request("direct conversations hold exactly two members")
            }
            StoreError::Database(sqlx::Error::RowNotFound) => Self::not_found("not found"),
            other => {
                error!(error = %other, "store failure");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl From<RealtimeError> for ApiError {
    fn from(value: RealtimeError) -> Self {
        let status = match &value {
            RealtimeError::Unauthorized => StatusCode::UNAUTHORIZED,
            RealtimeError::NotFound(_) => StatusCode::NOT_FOUND,
            RealtimeError::Forbidden(_) => StatusCode::FORBIDDEN,
            RealtimeError::Validation(_) => StatusCode::BAD_REQUEST,
            RealtimeError::Internal(_) => {
                error!(error = %value, "realtime failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, value.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        let err: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = StoreError::DirectMemberLimit.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err: ApiError = StoreError::AlreadyContact.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let err: ApiError = RealtimeError::Forbidden("no".to_string()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_detail_is_not_leaked() {
        let err: ApiError =
            RealtimeError::Internal("sqlite file is on fire".to_string()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("fire"));
    }
}

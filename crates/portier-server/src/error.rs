//! Error types for the server.
//!
//! Every variant renders a fixed, generic body. The underlying detail only
//! ever reaches the log.

use axum::{
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use portier_auth::AuthError;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The approval form was missing or carried an unreadable request.
    #[error("Invalid login form")]
    InvalidLogin,

    /// The provider could not parse the authorization request.
    #[error("Invalid authorization request: {0}")]
    InvalidAuthRequest(String),

    /// The provider refused to complete the authorization.
    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    /// A redirect target could not be put into a `Location` header.
    #[error("Invalid redirect target: {0}")]
    InvalidRedirect(String),

    /// Inbound body exceeded the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,

    /// The proxy target could not be reached.
    #[error("Upstream request failed: {0}")]
    Upstream(String),

    /// The auth adapter failed.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AuthError),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

impl ServerError {
    /// Status code and the public body for this error.
    fn public_parts(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::InvalidLogin => (StatusCode::UNAUTHORIZED, "INVALID LOGIN"),
            ServerError::InvalidAuthRequest(_) => {
                (StatusCode::BAD_REQUEST, "Invalid authorization request.")
            }
            ServerError::AuthorizationFailed(_) => {
                (StatusCode::BAD_REQUEST, "Authorization failed: invalid request.")
            }
            ServerError::InvalidRedirect(_) => (StatusCode::BAD_REQUEST, "Invalid redirect target."),
            ServerError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"),
            ServerError::Upstream(_)
            | ServerError::Adapter(_)
            | ServerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = self.public_parts();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, error = %message, "Client error");
        }

        let content_type = match self {
            ServerError::InvalidLogin => "text/html; charset=utf-8",
            _ => "text/plain; charset=utf-8",
        };

        (status, [(CONTENT_TYPE, content_type)], body).into_response()
    }
}

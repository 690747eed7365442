//! Error kinds produced by the grant engine and its components

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Client authentication failed")]
    InvalidClient,

    #[error("redirect_uri is not registered for this client")]
    InvalidRedirectUri,

    #[error("Requested scope exceeds what the client may request")]
    InvalidScope,

    #[error("Unsupported response_type: {0}")]
    UnsupportedResponseType(String),

    #[error("Unsupported grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error("Authorization code not found")]
    CodeNotFound,

    #[error("Authorization code has expired")]
    CodeExpired,

    #[error("Authorization code has already been used")]
    CodeAlreadyUsed,

    #[error("Authorization code was issued to another client")]
    ClientMismatch,

    #[error("redirect_uri does not match the authorization request")]
    RedirectMismatch,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, GrantError>;

impl GrantError {
    /// OAuth 2.0 error code for the `error` response field (RFC 6749 Sections 4.1.2.1 and 5.2)
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) | Self::InvalidRedirectUri => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidScope => "invalid_scope",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::CodeNotFound
            | Self::CodeExpired
            | Self::CodeAlreadyUsed
            | Self::ClientMismatch
            | Self::RedirectMismatch => "invalid_grant",
            Self::Internal(_) => "server_error",
        }
    }

    /// HTTP status for JSON error responses
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Human-readable description safe to show the caller. Internal faults get none.
    pub fn description(&self) -> Option<String> {
        match self {
            Self::Internal(_) => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

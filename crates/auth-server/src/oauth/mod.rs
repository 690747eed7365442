//! OAuth 2.0 HTTP endpoints
//!
//! Implements:
//! - RFC 6749 Section 4.1: Authorization Code grant (`/authorize`, `/oauth/token`)
//! - RFC 7009: Token Revocation (`/oauth/revoke`)
//! - RFC 8414: Authorization Server Metadata

pub mod authorize;
pub mod client_auth;
pub mod metadata;
pub mod revoke;
pub mod token;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GrantError;

/// OAuth error response body (RFC 6749 Section 5.2)
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl From<&GrantError> for ErrorBody {
    fn from(error: &GrantError) -> Self {
        Self {
            error: error.error_code().to_string(),
            error_description: error.description(),
        }
    }
}

/// JSON error response. Internal faults are logged here and reported without detail.
pub(crate) fn error_response(status: StatusCode, error: &GrantError) -> Response {
    if error.is_internal() {
        tracing::error!("Request failed with internal error: {}", error);
    }

    let mut response = (status, Json(ErrorBody::from(error))).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"oauth\""),
        );
    }
    response
}

/// Responses carrying credentials must not be cached (RFC 6749 Section 5.1)
pub(crate) fn no_store(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

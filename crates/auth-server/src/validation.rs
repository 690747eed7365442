//! Token validation endpoint for reverse-proxy forward auth
//!
//! Called by the proxy before forwarding a request to a protected service.
//! A 200 lets the request through; the granted client and scope are passed
//! along as response headers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::AppState;

pub const CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-auth-client-id");
pub const SCOPE_HEADER: HeaderName = HeaderName::from_static("x-auth-scope");

/// Handler for `GET /validate`
///
/// Returns 200 if the bearer token is valid, 401 otherwise.
pub async fn handler(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let auth_header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            tracing::debug!("No Authorization header present");
            return unauthorized("Bearer", "Missing Authorization header");
        }
    };

    let auth_str = match auth_header.to_str() {
        Ok(s) => s,
        Err(_) => {
            tracing::debug!("Invalid Authorization header encoding");
            return unauthorized("Bearer", "Invalid Authorization header");
        }
    };

    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        tracing::debug!("Authorization header does not start with 'Bearer '");
        return unauthorized("Bearer", "Invalid Authorization header format");
    };

    match state.engine.tokens().validate(token.trim()) {
        Ok(Some(stored)) => {
            tracing::debug!(
                "Request authenticated via access token for client {}",
                stored.client_id
            );
            let mut response = (StatusCode::OK, "OK").into_response();
            let headers = response.headers_mut();
            if let Ok(value) = HeaderValue::from_str(&stored.client_id) {
                headers.insert(CLIENT_ID_HEADER, value);
            }
            if let Ok(value) = HeaderValue::from_str(&stored.scope.to_string()) {
                headers.insert(SCOPE_HEADER, value);
            }
            response
        }
        Ok(None) => {
            tracing::debug!("Invalid or expired token");
            unauthorized("Bearer error=\"invalid_token\"", "Invalid or expired token")
        }
        Err(e) => {
            tracing::error!("Token validation failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn unauthorized(challenge: &'static str, message: &'static str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [("WWW-Authenticate", challenge)],
        message,
    )
        .into_response()
}

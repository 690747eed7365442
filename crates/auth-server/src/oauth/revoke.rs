//! RFC 7009: OAuth 2.0 Token Revocation

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use crate::params::Params;
use crate::AppState;

use super::client_auth::client_credentials;
use super::{error_response, no_store};

/// Handler for `POST /oauth/revoke`
///
/// Answers 200 for unknown tokens too, so callers learn nothing about token validity.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let params = Params::parse_all([query.as_deref().unwrap_or(""), body.as_str()]);

    let result = params.required("token").and_then(|token| {
        let credentials = client_credentials(&headers, &params)?;
        state
            .engine
            .revoke(&credentials.client_id, &credentials.client_secret, &token)
    });

    let response = match result {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => error_response(e.status(), &e),
    };
    no_store(response)
}

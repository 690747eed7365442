//! OAuth 2.0 Authorization Endpoint
//!
//! Consent is out of scope: a valid request is approved immediately and the
//! user agent is redirected back with a code.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::engine::{AuthorizeError, AuthorizeRequest};
use crate::error::{GrantError, Result};
use crate::params::Params;
use crate::AppState;

use super::error_response;

/// Handler for `GET /authorize`
pub async fn handler(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let params = Params::parse(query.as_deref().unwrap_or(""));

    // Nothing can be redirected until these two are known and trusted
    let client_id = match params.required("client_id") {
        Ok(v) => v,
        Err(e) => return direct_error(&e),
    };
    let redirect_uri = match params.required("redirect_uri") {
        Ok(v) => v,
        Err(e) => return direct_error(&e),
    };

    let result = match read_request(&params, &client_id, &redirect_uri) {
        Ok(request) => state.engine.authorize(request),
        Err(e) => {
            let echoed_state = params.optional("state").ok().flatten();
            Err(state
                .engine
                .redirect_error(&client_id, &redirect_uri, echoed_state, e))
        }
    };

    match result {
        Ok(grant) => match grant.redirect_url() {
            Ok(url) => found(url),
            Err(e) => direct_error(&e),
        },
        Err(err) => rejected(&err),
    }
}

fn read_request(params: &Params, client_id: &str, redirect_uri: &str) -> Result<AuthorizeRequest> {
    Ok(AuthorizeRequest {
        response_type: params.required("response_type")?,
        client_id: client_id.to_string(),
        redirect_uri: redirect_uri.to_string(),
        scope: params.optional("scope")?,
        state: params.optional("state")?,
    })
}

fn rejected(err: &AuthorizeError) -> Response {
    match err.redirect_url() {
        Some(Ok(url)) => {
            if err.error().is_internal() {
                tracing::error!("Authorization failed with internal error: {}", err.error());
            }
            found(url)
        }
        Some(Err(e)) => direct_error(&e),
        None => direct_error(err.error()),
    }
}

/// Error shown to the user agent instead of redirecting
fn direct_error(error: &GrantError) -> Response {
    let status = if error.is_internal() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_REQUEST
    };
    error_response(status, error)
}

fn found(location: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response()
}

//! OAuth 2.0 Token Endpoint
//!
//! Handles authorization code exchange. Parameters come from the query string
//! or the form body; client credentials from either of those or HTTP Basic.

use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::engine::{TokenRequest, GRANT_TYPE_AUTHORIZATION_CODE};
use crate::error::{GrantError, Result};
use crate::params::Params;
use crate::AppState;

use super::client_auth::client_credentials;
use super::{error_response, no_store};

/// Handler for `POST /oauth/token`
pub async fn handler(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: String,
) -> Response {
    let params = Params::parse_all([query.as_deref().unwrap_or(""), body.as_str()]);

    let response = match read_request(&headers, &params).and_then(|r| state.engine.exchange(r)) {
        Ok(token) => (StatusCode::OK, Json(token)).into_response(),
        Err(e) => error_response(e.status(), &e),
    };
    no_store(response)
}

fn read_request(headers: &HeaderMap, params: &Params) -> Result<TokenRequest> {
    let grant_type = params.required("grant_type")?;
    // Other grants have different required parameters; reject before asking for them
    if grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
        return Err(GrantError::UnsupportedGrantType(grant_type));
    }

    let credentials = client_credentials(headers, params)?;
    Ok(TokenRequest {
        grant_type,
        code: params.required("code")?,
        redirect_uri: params.required("redirect_uri")?,
        client_id: credentials.client_id,
        client_secret: credentials.client_secret,
    })
}

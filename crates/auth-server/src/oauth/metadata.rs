//! RFC 8414: OAuth 2.0 Authorization Server Metadata
//!
//! Provides the `/.well-known/oauth-authorization-server` endpoint that clients
//! use to discover OAuth endpoints and capabilities.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::engine::{GRANT_TYPE_AUTHORIZATION_CODE, RESPONSE_TYPE_CODE};
use crate::AppState;

/// OAuth 2.0 Authorization Server Metadata (RFC 8414)
#[derive(Debug, Serialize)]
pub struct AuthorizationServerMetadata {
    /// The authorization server's issuer identifier (URL)
    pub issuer: String,

    /// URL of the authorization endpoint
    pub authorization_endpoint: String,

    /// URL of the token endpoint
    pub token_endpoint: String,

    /// URL of the revocation endpoint (RFC 7009)
    pub revocation_endpoint: String,

    /// JSON array of OAuth 2.0 response_type values supported
    pub response_types_supported: Vec<String>,

    /// JSON array of OAuth 2.0 grant_type values supported
    pub grant_types_supported: Vec<String>,

    /// JSON array of client authentication methods supported at token endpoint
    pub token_endpoint_auth_methods_supported: Vec<String>,

    /// Same, for the revocation endpoint
    pub revocation_endpoint_auth_methods_supported: Vec<String>,
}

/// Handler for `GET /.well-known/oauth-authorization-server`
pub async fn handler(State(state): State<Arc<AppState>>) -> Json<AuthorizationServerMetadata> {
    let base_url = state.public_url.trim_end_matches('/');
    let auth_methods = vec![
        "client_secret_basic".to_string(),
        "client_secret_post".to_string(),
    ];

    let metadata = AuthorizationServerMetadata {
        issuer: base_url.to_string(),
        authorization_endpoint: format!("{}/authorize", base_url),
        token_endpoint: format!("{}/oauth/token", base_url),
        revocation_endpoint: format!("{}/oauth/revoke", base_url),
        response_types_supported: vec![RESPONSE_TYPE_CODE.to_string()],
        grant_types_supported: vec![GRANT_TYPE_AUTHORIZATION_CODE.to_string()],
        token_endpoint_auth_methods_supported: auth_methods.clone(),
        revocation_endpoint_auth_methods_supported: auth_methods,
    };

    tracing::debug!("Serving authorization server metadata");
    Json(metadata)
}

//! Authorization code grant (RFC 6749 Section 4.1)
//!
//! Two legs share nothing but the code record:
//! - `authorize` validates the client and redirect URI, then issues a code
//! - `exchange` authenticates the client, redeems the code and mints a token

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::codes::CodeStore;
use crate::crypto::hash_secret;
use crate::error::{GrantError, Result};
use crate::registry::{Client, ClientRegistry};
use crate::scope::Scope;
use crate::tokens::TokenIssuer;

pub const RESPONSE_TYPE_CODE: &str = "code";
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Parsed `/authorize` request
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// A successful authorization: where to send the user agent, and with what
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub redirect_uri: String,
    pub code: String,
    pub state: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationGrant {
    pub fn redirect_url(&self) -> Result<String> {
        let mut pairs: Vec<(&str, &str)> = vec![("code", self.code.as_str())];
        if let Some(state) = &self.state {
            pairs.push(("state", state.as_str()));
        }
        append_query(&self.redirect_uri, &pairs)
    }
}

/// Why an authorization request failed, and whether it is safe to say so by redirect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeError {
    /// Client or redirect URI could not be trusted; answer the user agent directly
    Direct(GrantError),

    /// Redirect URI is registered for the client; report the error there
    Redirect {
        redirect_uri: String,
        state: Option<String>,
        error: GrantError,
    },
}

impl AuthorizeError {
    pub fn error(&self) -> &GrantError {
        match self {
            Self::Direct(error) | Self::Redirect { error, .. } => error,
        }
    }

    /// Location for a `Redirect` error; `None` for `Direct`
    pub fn redirect_url(&self) -> Option<Result<String>> {
        let Self::Redirect {
            redirect_uri,
            state,
            error,
        } = self
        else {
            return None;
        };

        let description = error.description();
        let mut pairs: Vec<(&str, &str)> = vec![("error", error.error_code())];
        if let Some(description) = &description {
            pairs.push(("error_description", description.as_str()));
        }
        if let Some(state) = state {
            pairs.push(("state", state.as_str()));
        }
        Some(append_query(redirect_uri, &pairs))
    }
}

/// Parsed `/oauth/token` request after client credentials are extracted
#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Successful token response (RFC 6749 Section 5.1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub codes: usize,
    pub tokens: usize,
}

pub struct GrantEngine {
    registry: ClientRegistry,
    codes: CodeStore,
    tokens: TokenIssuer,
}

impl GrantEngine {
    pub fn new(registry: ClientRegistry, codes: CodeStore, tokens: TokenIssuer) -> Self {
        Self {
            registry,
            codes,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Leg A: validate an authorization request and issue a code
    pub fn authorize(
        &self,
        request: AuthorizeRequest,
    ) -> std::result::Result<AuthorizationGrant, AuthorizeError> {
        let client = self.trusted_client(&request.client_id, &request.redirect_uri)?;

        let redirect = |error: GrantError| AuthorizeError::Redirect {
            redirect_uri: request.redirect_uri.clone(),
            state: request.state.clone(),
            error,
        };

        if request.response_type != RESPONSE_TYPE_CODE {
            tracing::debug!(
                "Rejected response_type {:?} for client {}",
                request.response_type,
                client.client_id
            );
            return Err(redirect(GrantError::UnsupportedResponseType(
                request.response_type.clone(),
            )));
        }

        let scope = Scope::parse(request.scope.as_deref().unwrap_or(""));
        if !scope.is_subset(&client.scopes) {
            tracing::warn!(
                "Client {} requested scope '{}' outside permitted '{}'",
                client.client_id,
                scope,
                client.scopes
            );
            return Err(redirect(GrantError::InvalidScope));
        }

        let code = self
            .codes
            .issue(&client.client_id, &request.redirect_uri, scope)
            .map_err(redirect)?;

        tracing::info!(
            "Issued authorization code for client {} (scope '{}')",
            client.client_id,
            code.scope
        );

        Ok(AuthorizationGrant {
            redirect_uri: request.redirect_uri,
            code: code.code,
            state: request.state,
            expires_at: code.expires_at,
        })
    }

    /// Report a malformed authorization request. The error is only redirected
    /// once the client and redirect URI check out.
    pub fn redirect_error(
        &self,
        client_id: &str,
        redirect_uri: &str,
        state: Option<String>,
        error: GrantError,
    ) -> AuthorizeError {
        match self.trusted_client(client_id, redirect_uri) {
            Ok(_) => AuthorizeError::Redirect {
                redirect_uri: redirect_uri.to_string(),
                state,
                error,
            },
            Err(direct) => direct,
        }
    }

    /// Leg B: exchange a code for an access token
    pub fn exchange(&self, request: TokenRequest) -> Result<TokenResponse> {
        if request.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(GrantError::UnsupportedGrantType(request.grant_type));
        }

        self.authenticate(&request.client_id, &request.client_secret)?;

        // The code record learns its token hash in the same step that consumes it
        let raw_token = self.tokens.draw()?;
        let token_hash = hash_secret(&raw_token);

        let scope = match self.codes.redeem(
            &request.code,
            &request.client_id,
            &request.redirect_uri,
            &token_hash,
        ) {
            Ok(scope) => scope,
            Err(GrantError::CodeAlreadyUsed) => {
                self.revoke_replayed(&request.code, &request.client_id);
                return Err(GrantError::CodeAlreadyUsed);
            }
            Err(e) => {
                tracing::warn!(
                    "Code redemption failed for client {}: {}",
                    request.client_id,
                    e
                );
                return Err(e);
            }
        };

        let token = self.tokens.activate(raw_token, &request.client_id, scope)?;

        // A replay that lands before activation finds nothing to revoke and is
        // caught by its flag here; one that lands after revokes the stored token
        if self.codes.is_replayed(&request.code)? {
            tracing::warn!(
                "Authorization code replayed while exchanging, revoking token for client {}",
                request.client_id
            );
            self.tokens.revoke_hash(&token_hash)?;
        }

        tracing::info!("Issued access token for client {}", request.client_id);

        Ok(TokenResponse {
            expires_in: token.expires_in(),
            scope: token.scope.to_string(),
            access_token: token.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
        })
    }

    /// RFC 7009 revocation. Unknown tokens and tokens of other clients are ignored.
    pub fn revoke(&self, client_id: &str, client_secret: &str, token: &str) -> Result<()> {
        self.authenticate(client_id, client_secret)?;

        match self.tokens.validate(token)? {
            Some(stored) if stored.client_id == client_id => {
                self.tokens.revoke_hash(&stored.token_hash)?;
                tracing::info!("Revoked access token for client {}", client_id);
            }
            Some(_) => {
                tracing::warn!(
                    "Client {} tried to revoke a token issued to another client",
                    client_id
                );
            }
            None => tracing::debug!("Revocation requested for unknown token"),
        }
        Ok(())
    }

    /// Purge expired codes and tokens
    pub fn sweep(&self) -> Result<SweepReport> {
        Ok(SweepReport {
            codes: self.codes.purge_expired()?,
            tokens: self.tokens.purge_expired()?,
        })
    }

    fn trusted_client(
        &self,
        client_id: &str,
        redirect_uri: &str,
    ) -> std::result::Result<Client, AuthorizeError> {
        let client = self
            .registry
            .lookup(client_id)
            .map_err(AuthorizeError::Direct)?
            .ok_or_else(|| {
                tracing::warn!("Authorization request for unknown client {}", client_id);
                AuthorizeError::Direct(GrantError::InvalidClient)
            })?;

        if !client.allows_redirect(redirect_uri) {
            tracing::warn!(
                "Unregistered redirect_uri {:?} for client {}",
                redirect_uri,
                client_id
            );
            return Err(AuthorizeError::Direct(GrantError::InvalidRedirectUri));
        }

        Ok(client)
    }

    fn authenticate(&self, client_id: &str, client_secret: &str) -> Result<()> {
        if self.registry.authenticate(client_id, client_secret)? {
            Ok(())
        } else {
            tracing::warn!("Client authentication failed for client_id={}", client_id);
            Err(GrantError::InvalidClient)
        }
    }

    /// A consumed code came back: revoke whatever it was exchanged for (RFC 6749 Section 4.1.2)
    fn revoke_replayed(&self, code: &str, client_id: &str) {
        tracing::warn!("Authorization code replay by client {}", client_id);

        let revoked = self
            .codes
            .issued_token(code)
            .and_then(|hash| match hash {
                Some(hash) => self.tokens.revoke_hash(&hash),
                None => Ok(None),
            });

        match revoked {
            Ok(Some(token)) => tracing::warn!(
                "Revoked access token issued to client {} from replayed code",
                token.client_id
            ),
            Ok(None) => {}
            Err(e) => tracing::error!("Failed to revoke token for replayed code: {}", e),
        }
    }
}

/// Append query parameters to a registered redirect URI, keeping its existing query
fn append_query(redirect_uri: &str, pairs: &[(&str, &str)]) -> Result<String> {
    let mut url = url::Url::parse(redirect_uri).map_err(|e| {
        GrantError::Internal(format!("registered redirect_uri is not a URL: {e}"))
    })?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    Ok(url.into())
}

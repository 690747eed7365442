//! Authorization code lifecycle: issue, single-use redemption, expiry
//!
//! Records are keyed by the hash of the code. A redeemed record stays in the
//! table, marked consumed, until it expires so replays can be told apart
//! from unknown codes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;
use crate::crypto::{hash_secret, SecretGenerator};
use crate::error::{GrantError, Result};
use crate::scope::Scope;

/// Redraws allowed when a freshly generated code already exists
const MAX_ISSUE_ATTEMPTS: usize = 4;

/// An issued authorization code, as handed to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// A code record as held by a `CodeRepository`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCode {
    pub code_hash: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    /// Hash of the access token minted from this code, set together with `consumed`
    pub issued_token: Option<String>,
    /// A redemption was attempted after the code was consumed
    pub replayed: bool,
}

impl StoredCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Checks that follow the existence and expiry checks
    pub fn check_redeemable(&self, client_id: &str, redirect_uri: &str) -> Result<()> {
        if self.consumed {
            return Err(GrantError::CodeAlreadyUsed);
        }
        if self.client_id != client_id {
            return Err(GrantError::ClientMismatch);
        }
        if self.redirect_uri != redirect_uri {
            return Err(GrantError::RedirectMismatch);
        }
        Ok(())
    }
}

/// Storage for code records.
///
/// `consume` must perform lookup, validation and marking as one atomic step:
/// two concurrent calls for the same code may never both succeed. A call that
/// fails with `CodeAlreadyUsed` must flag the record as replayed in that same step.
pub trait CodeRepository: Send + Sync {
    /// Insert a record. Returns `false` without overwriting if the hash is taken.
    fn insert(&self, code: StoredCode) -> Result<bool>;

    /// Validate and mark a record consumed, linking it to `token_hash`.
    /// Expired records are removed.
    fn consume(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
        client_id: &str,
        redirect_uri: &str,
        token_hash: &str,
    ) -> Result<StoredCode>;

    fn issued_token(&self, code_hash: &str) -> Result<Option<String>>;

    fn is_replayed(&self, code_hash: &str) -> Result<bool>;

    /// Drop every expired record, returning how many were removed
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Mutex-guarded map. Codes are short-lived and not persisted.
#[derive(Debug, Default)]
pub struct InMemoryCodes {
    codes: Mutex<HashMap<String, StoredCode>>,
}

impl InMemoryCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|codes| codes.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, StoredCode>>> {
        self.codes
            .lock()
            .map_err(|_| GrantError::Internal("authorization code table lock poisoned".to_string()))
    }
}

impl CodeRepository for InMemoryCodes {
    fn insert(&self, code: StoredCode) -> Result<bool> {
        let mut codes = self.lock()?;
        if codes.contains_key(&code.code_hash) {
            return Ok(false);
        }
        codes.insert(code.code_hash.clone(), code);
        Ok(true)
    }

    fn consume(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
        client_id: &str,
        redirect_uri: &str,
        token_hash: &str,
    ) -> Result<StoredCode> {
        let mut codes = self.lock()?;

        let expired = match codes.get(code_hash) {
            Some(code) => code.is_expired(now),
            None => return Err(GrantError::CodeNotFound),
        };
        if expired {
            codes.remove(code_hash);
            return Err(GrantError::CodeExpired);
        }

        let code = codes.get_mut(code_hash).ok_or(GrantError::CodeNotFound)?;
        if let Err(e) = code.check_redeemable(client_id, redirect_uri) {
            if e == GrantError::CodeAlreadyUsed {
                code.replayed = true;
            }
            return Err(e);
        }
        code.consumed = true;
        code.issued_token = Some(token_hash.to_string());
        Ok(code.clone())
    }

    fn issued_token(&self, code_hash: &str) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(code_hash)
            .and_then(|c| c.issued_token.clone()))
    }

    fn is_replayed(&self, code_hash: &str) -> Result<bool> {
        Ok(self.lock()?.get(code_hash).is_some_and(|c| c.replayed))
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut codes = self.lock()?;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired(now));
        Ok(before - codes.len())
    }
}

/// Issues and redeems authorization codes
pub struct CodeStore {
    repository: Arc<dyn CodeRepository>,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn SecretGenerator>,
    lifetime: Duration,
}

impl CodeStore {
    /// `lifetime` must be positive so every code expires strictly after issuance.
    pub fn new(
        repository: Arc<dyn CodeRepository>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn SecretGenerator>,
        lifetime: Duration,
    ) -> Self {
        Self {
            repository,
            clock,
            generator,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn issue(&self, client_id: &str, redirect_uri: &str, scope: Scope) -> Result<AuthorizationCode> {
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let code = self.generator.generate()?;
            let issued_at = self.clock.now();
            let expires_at = issued_at + self.lifetime;

            let stored = StoredCode {
                code_hash: hash_secret(&code),
                client_id: client_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                scope: scope.clone(),
                issued_at,
                expires_at,
                consumed: false,
                issued_token: None,
                replayed: false,
            };

            if self.repository.insert(stored)? {
                return Ok(AuthorizationCode {
                    code,
                    client_id: client_id.to_string(),
                    redirect_uri: redirect_uri.to_string(),
                    scope,
                    issued_at,
                    expires_at,
                });
            }

            tracing::warn!(attempt, "Authorization code collision, drawing a new code");
        }

        tracing::error!(
            "Could not draw a unique authorization code after {} attempts",
            MAX_ISSUE_ATTEMPTS
        );
        Err(GrantError::Internal(
            "could not draw a unique authorization code".to_string(),
        ))
    }

    /// Redeem a code exactly once for the token hashed as `token_hash`,
    /// returning the scope it was issued for
    pub fn redeem(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        token_hash: &str,
    ) -> Result<Scope> {
        let now = self.clock.now();
        let stored =
            self.repository
                .consume(&hash_secret(code), now, client_id, redirect_uri, token_hash)?;
        Ok(stored.scope)
    }

    /// Hash of the access token `code` was redeemed for
    pub fn issued_token(&self, code: &str) -> Result<Option<String>> {
        self.repository.issued_token(&hash_secret(code))
    }

    /// True once a redemption of `code` has failed with `CodeAlreadyUsed`
    pub fn is_replayed(&self, code: &str) -> Result<bool> {
        self.repository.is_replayed(&hash_secret(code))
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.repository.purge_expired(self.clock.now())
    }
}

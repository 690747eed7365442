//! Access token issuance and the token store resource servers validate against
//!
//! Tokens are opaque bearer strings. Only their hashes are kept, either in
//! memory or as a `tokens.json` snapshot in the config directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::crypto::{hash_secret, SecretGenerator};
use crate::error::{GrantError, Result};
use crate::scope::Scope;

/// A freshly minted access token. `token` is the only copy of the raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub client_id: String,
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Lifetime in whole seconds, as reported in `expires_in`
    pub fn expires_in(&self) -> u64 {
        (self.expires_at - self.issued_at).num_seconds().max(0) as u64
    }
}

/// A stored access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub token_hash: String,
    pub client_id: String,
    pub scope: Scope,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenFile {
    /// Maps token hash -> token data
    tokens: HashMap<String, StoredToken>,
}

pub struct TokenStore {
    tokens: RwLock<TokenFile>,
    /// Snapshot location; `None` keeps tokens in memory only
    path: Option<PathBuf>,
}

impl TokenStore {
    pub fn in_memory() -> Self {
        Self {
            tokens: RwLock::new(TokenFile::default()),
            path: None,
        }
    }

    /// Open (or create) `tokens.json` in `dir`, dropping tokens expired as of `now`
    pub fn open(dir: &Path, now: DateTime<Utc>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create token directory: {:?}", dir))?;

        let path = dir.join("tokens.json");
        let mut file = TokenFile::default();
        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read token file: {:?}", path))?;
            file = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse token file: {:?}", path))?;

            file.tokens.retain(|_, t| !t.is_expired(now));
            tracing::info!("Loaded {} active tokens", file.tokens.len());
        }

        Ok(Self {
            tokens: RwLock::new(file),
            path: Some(path),
        })
    }

    pub fn insert(&self, token: StoredToken) -> Result<()> {
        let mut store = self.write()?;
        store.tokens.insert(token.token_hash.clone(), token);
        self.save(&store)
    }

    /// Look up a token by hash, ignoring expired entries
    pub fn get(&self, token_hash: &str, now: DateTime<Utc>) -> Result<Option<StoredToken>> {
        Ok(self
            .read()?
            .tokens
            .get(token_hash)
            .filter(|t| !t.is_expired(now))
            .cloned())
    }

    pub fn remove(&self, token_hash: &str) -> Result<Option<StoredToken>> {
        let mut store = self.write()?;
        let removed = store.tokens.remove(token_hash);
        if removed.is_some() {
            self.save(&store)?;
        }
        Ok(removed)
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut store = self.write()?;
        let before = store.tokens.len();
        store.tokens.retain(|_, t| !t.is_expired(now));
        let removed = before - store.tokens.len();
        if removed > 0 {
            self.save(&store)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.read().map(|s| s.tokens.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, TokenFile>> {
        self.tokens
            .read()
            .map_err(|_| GrantError::Internal("token store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, TokenFile>> {
        self.tokens
            .write()
            .map_err(|_| GrantError::Internal("token store lock poisoned".to_string()))
    }

    /// Called with the write lock held so snapshots land in order
    fn save(&self, store: &TokenFile) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let content = serde_json::to_string_pretty(store)
            .map_err(|e| GrantError::Internal(format!("failed to serialize tokens: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .and_then(|_| std::fs::rename(&tmp, path))
            .map_err(|e| {
                tracing::error!("Failed to write token file {:?}: {}", path, e);
                GrantError::Internal(format!("failed to write token file: {e}"))
            })
    }
}

/// Mints access tokens and answers verifier lookups
pub struct TokenIssuer {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn SecretGenerator>,
    lifetime: Duration,
}

impl TokenIssuer {
    /// `lifetime` must be positive so every token expires strictly after issuance.
    pub fn new(
        store: Arc<TokenStore>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn SecretGenerator>,
        lifetime: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            generator,
            lifetime,
        }
    }

    pub fn issue(&self, client_id: &str, scope: Scope) -> Result<AccessToken> {
        let token = self.draw()?;
        self.activate(token, client_id, scope)
    }

    /// Generate a raw token value without making it valid
    pub fn draw(&self) -> Result<String> {
        self.generator.generate()
    }

    /// Store a drawn token so verifiers accept it
    pub fn activate(&self, token: String, client_id: &str, scope: Scope) -> Result<AccessToken> {
        let issued_at = self.clock.now();
        let expires_at = issued_at + self.lifetime;

        self.store.insert(StoredToken {
            token_hash: hash_secret(&token),
            client_id: client_id.to_string(),
            scope: scope.clone(),
            issued_at,
            expires_at,
        })?;

        Ok(AccessToken {
            token,
            client_id: client_id.to_string(),
            scope,
            issued_at,
            expires_at,
        })
    }

    /// Resolve a presented bearer token, or `None` if unknown, revoked or expired
    pub fn validate(&self, token: &str) -> Result<Option<StoredToken>> {
        self.store.get(&hash_secret(token), self.clock.now())
    }

    pub fn revoke(&self, token: &str) -> Result<Option<StoredToken>> {
        self.revoke_hash(&hash_secret(token))
    }

    pub fn revoke_hash(&self, token_hash: &str) -> Result<Option<StoredToken>> {
        self.store.remove(token_hash)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.store.purge_expired(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::OsRandom;

    fn issuer_with(store: Arc<TokenStore>) -> (TokenIssuer, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let issuer = TokenIssuer::new(
            store,
            clock.clone(),
            Arc::new(OsRandom::new()),
            Duration::hours(1),
        );
        (issuer, clock)
    }

    #[test]
    fn test_issue_and_validate() {
        let (issuer, _) = issuer_with(Arc::new(TokenStore::in_memory()));
        let token = issuer.issue("abc", Scope::parse("read")).unwrap();
        assert_eq!(token.expires_in(), 3600);

        let stored = issuer.validate(&token.token).unwrap().unwrap();
        assert_eq!(stored.client_id, "abc");
        assert_eq!(stored.scope, Scope::parse("read"));
        assert_eq!(stored.expires_at, token.expires_at);
    }

    #[test]
    fn test_store_keeps_only_hashes() {
        let store = Arc::new(TokenStore::in_memory());
        let (issuer, clock) = issuer_with(store.clone());
        let token = issuer.issue("abc", Scope::default()).unwrap();
        assert!(store.get(&token.token, clock.now()).unwrap().is_none());
        assert!(store.get(&hash_secret(&token.token), clock.now()).unwrap().is_some());
    }

    #[test]
    fn test_expired_token_rejected() {
        let (issuer, clock) = issuer_with(Arc::new(TokenStore::in_memory()));
        let token = issuer.issue("abc", Scope::default()).unwrap();

        clock.advance(Duration::hours(1));
        assert!(issuer.validate(&token.token).unwrap().is_some());

        clock.advance(Duration::seconds(1));
        assert!(issuer.validate(&token.token).unwrap().is_none());
    }

    #[test]
    fn test_revoke() {
        let (issuer, _) = issuer_with(Arc::new(TokenStore::in_memory()));
        let token = issuer.issue("abc", Scope::default()).unwrap();

        assert!(issuer.revoke(&token.token).unwrap().is_some());
        assert!(issuer.validate(&token.token).unwrap().is_none());
        assert!(issuer.revoke(&token.token).unwrap().is_none());
    }

    #[test]
    fn test_purge_expired() {
        let store = Arc::new(TokenStore::in_memory());
        let (issuer, clock) = issuer_with(store.clone());
        issuer.issue("abc", Scope::default()).unwrap();
        clock.advance(Duration::minutes(30));
        issuer.issue("abc", Scope::default()).unwrap();
        clock.advance(Duration::minutes(31));

        assert_eq!(issuer.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_persisted_tokens_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let token = {
            let store = Arc::new(TokenStore::open(dir.path(), Utc::now()).unwrap());
            let issuer = TokenIssuer::new(
                store,
                Arc::new(crate::clock::SystemClock),
                Arc::new(OsRandom::new()),
                Duration::hours(1),
            );
            issuer.issue("abc", Scope::parse("read")).unwrap()
        };

        let content = std::fs::read_to_string(dir.path().join("tokens.json")).unwrap();
        assert!(!content.contains(&token.token));

        let reopened = TokenStore::open(dir.path(), Utc::now()).unwrap();
        let stored = reopened
            .get(&hash_secret(&token.token), Utc::now())
            .unwrap()
            .unwrap();
        assert_eq!(stored.client_id, "abc");
    }

    #[test]
    fn test_reopen_drops_expired_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let issued_at = Utc::now();
        {
            let store = TokenStore::open(dir.path(), issued_at).unwrap();
            for (hash, lifetime) in [("short", 60), ("long", 3600)] {
                store
                    .insert(StoredToken {
                        token_hash: hash.to_string(),
                        client_id: "abc".to_string(),
                        scope: Scope::default(),
                        issued_at,
                        expires_at: issued_at + Duration::seconds(lifetime),
                    })
                    .unwrap();
            }
        }

        let clock = ManualClock::new(issued_at);
        clock.advance(Duration::seconds(60));
        assert_eq!(TokenStore::open(dir.path(), clock.now()).unwrap().len(), 2);

        clock.advance(Duration::seconds(1));
        let reopened = TokenStore::open(dir.path(), clock.now()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.get("long", clock.now()).unwrap().is_some());
    }

    #[test]
    fn test_drawn_token_is_inert_until_activated() {
        let (issuer, _) = issuer_with(Arc::new(TokenStore::in_memory()));
        let token = issuer.draw().unwrap();
        assert!(issuer.validate(&token).unwrap().is_none());

        let activated = issuer.activate(token.clone(), "abc", Scope::parse("read")).unwrap();
        assert_eq!(activated.token, token);
        assert_eq!(issuer.validate(&token).unwrap().unwrap().scope, Scope::parse("read"));
    }
}

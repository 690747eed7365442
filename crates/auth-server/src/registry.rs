//! Registered OAuth clients
//!
//! Registration itself happens elsewhere (config file, admin tooling); this
//! module only reads client records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_secret, secrets_match};
use crate::error::Result;
use crate::scope::Scope;

/// Compared against when the client id is unknown, so the failure path
/// costs the same hash-and-compare as a wrong secret.
const PLACEHOLDER_SECRET_HASH: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// A registered OAuth client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,

    #[serde(default)]
    pub client_name: Option<String>,

    /// `hash_secret` of the client secret
    pub client_secret_hash: String,

    /// Exact-match allow-list
    pub redirect_uris: HashSet<String>,

    /// Scopes this client may request
    #[serde(default)]
    pub scopes: Scope,
}

impl Client {
    pub fn allows_redirect(&self, uri: &str) -> bool {
        self.redirect_uris.contains(uri)
    }
}

/// Read-only lookup of client records
pub trait ClientRepository: Send + Sync {
    fn find(&self, client_id: &str) -> Result<Option<Client>>;
}

/// Clients held in memory, usually loaded from `config.json`
#[derive(Debug, Default)]
pub struct InMemoryClients {
    clients: HashMap<String, Client>,
}

impl InMemoryClients {
    pub fn new(clients: impl IntoIterator<Item = Client>) -> Self {
        Self {
            clients: clients
                .into_iter()
                .map(|c| (c.client_id.clone(), c))
                .collect(),
        }
    }
}

impl ClientRepository for InMemoryClients {
    fn find(&self, client_id: &str) -> Result<Option<Client>> {
        Ok(self.clients.get(client_id).cloned())
    }
}

pub struct ClientRegistry {
    repository: Arc<dyn ClientRepository>,
}

impl ClientRegistry {
    pub fn new(repository: Arc<dyn ClientRepository>) -> Self {
        Self { repository }
    }

    pub fn lookup(&self, client_id: &str) -> Result<Option<Client>> {
        self.repository.find(client_id)
    }

    /// Check a client's secret. Unknown clients and wrong secrets are indistinguishable.
    pub fn authenticate(&self, client_id: &str, client_secret: &str) -> Result<bool> {
        let client = self.repository.find(client_id)?;
        let supplied = hash_secret(client_secret);
        let stored = client
            .as_ref()
            .map(|c| c.client_secret_hash.as_str())
            .unwrap_or(PLACEHOLDER_SECRET_HASH);

        let matched = secrets_match(&supplied, stored);
        Ok(matched && client.is_some())
    }

    pub fn validate_redirect_uri(&self, client_id: &str, uri: &str) -> Result<bool> {
        Ok(self
            .repository
            .find(client_id)?
            .is_some_and(|c| c.allows_redirect(uri)))
    }
}

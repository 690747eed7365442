//! Configuration loading and management

use std::collections::HashSet;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::registry::Client;

/// Longest lifetime accepted for codes and tokens (366 days)
const MAX_LIFETIME_SECS: u64 = 366 * 24 * 3600;

/// Main configuration for the auth server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Registered OAuth clients
    #[serde(default)]
    pub clients: Vec<Client>,

    /// Token configuration
    #[serde(default)]
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Access token lifetime in seconds (default: 1 hour)
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime_secs: u64,

    /// Authorization code lifetime in seconds (default: 10 minutes)
    #[serde(default = "default_code_lifetime")]
    pub authorization_code_lifetime_secs: u64,

    /// How often expired codes and tokens are purged (default: 1 minute)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Keep issued tokens in `tokens.json` so they survive restarts
    #[serde(default = "default_true")]
    pub persist_tokens: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime_secs: default_access_token_lifetime(),
            authorization_code_lifetime_secs: default_code_lifetime(),
            sweep_interval_secs: default_sweep_interval(),
            persist_tokens: default_true(),
        }
    }
}

impl TokenConfig {
    pub fn access_token_lifetime(&self) -> Duration {
        Duration::seconds(self.access_token_lifetime_secs.min(MAX_LIFETIME_SECS) as i64)
    }

    pub fn code_lifetime(&self) -> Duration {
        Duration::seconds(self.authorization_code_lifetime_secs.min(MAX_LIFETIME_SECS) as i64)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

fn default_true() -> bool {
    true
}

fn default_access_token_lifetime() -> u64 {
    3600 // 1 hour
}

fn default_code_lifetime() -> u64 {
    600 // 10 minutes
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_path: &str) -> Result<Self> {
        let config_file = Path::new(config_path).join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| "Failed to parse config.json")?;
            config
                .validate()
                .with_context(|| format!("Invalid configuration in {:?}", config_file))?;
            tracing::info!(
                "Loaded configuration from {:?} ({} clients)",
                config_file,
                config.clients.len()
            );
            Ok(config)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_file
            );
            let config = Config::default();

            // Create config directory if it doesn't exist
            std::fs::create_dir_all(config_path)
                .with_context(|| format!("Failed to create config directory: {}", config_path))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }

    pub fn validate(&self) -> Result<()> {
        let tokens = &self.tokens;
        for (name, secs) in [
            ("access_token_lifetime_secs", tokens.access_token_lifetime_secs),
            ("authorization_code_lifetime_secs", tokens.authorization_code_lifetime_secs),
        ] {
            if secs == 0 || secs > MAX_LIFETIME_SECS {
                bail!("{} must be between 1 and {}", name, MAX_LIFETIME_SECS);
            }
        }
        if tokens.sweep_interval_secs == 0 {
            bail!("sweep_interval_secs must be at least 1");
        }

        let mut seen = HashSet::new();
        for client in &self.clients {
            if client.client_id.is_empty() {
                bail!("client_id must not be empty");
            }
            if !seen.insert(client.client_id.as_str()) {
                bail!("Duplicate client_id: {}", client.client_id);
            }
            if client.client_secret_hash.is_empty() {
                bail!("Client {} has no client_secret_hash", client.client_id);
            }
            if client.redirect_uris.is_empty() {
                bail!("Client {} has no redirect_uris", client.client_id);
            }
            for uri in &client.redirect_uris {
                validate_redirect_uri(uri)
                    .with_context(|| format!("Client {} redirect_uri {:?}", client.client_id, uri))?;
            }
        }

        Ok(())
    }
}

/// Registered redirect URIs must be absolute and carry no fragment (RFC 6749 Section 3.1.2)
fn validate_redirect_uri(uri: &str) -> Result<()> {
    let parsed = url::Url::parse(uri).with_context(|| "not an absolute URL")?;
    if parsed.cannot_be_a_base() {
        bail!("not a hierarchical URL");
    }
    if parsed.fragment().is_some() {
        bail!("must not contain a fragment");
    }
    Ok(())
}

//! Secret generation, hashing and comparison
//!
//! Codes, tokens and client secrets are never stored in the clear: the
//! stores key everything by `hash_secret` of the raw value.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{GrantError, Result};

/// Source of unguessable credential values
pub trait SecretGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}

/// Draws secrets from the operating system's CSPRNG
#[derive(Debug, Clone, Copy)]
pub struct OsRandom {
    bytes: usize,
}

impl OsRandom {
    /// 256 bits per secret
    pub const DEFAULT_BYTES: usize = 32;

    pub fn new() -> Self {
        Self {
            bytes: Self::DEFAULT_BYTES,
        }
    }

    /// Custom secret length. Anything below 16 bytes is raised to 16.
    pub fn with_bytes(bytes: usize) -> Self {
        Self {
            bytes: bytes.max(16),
        }
    }
}

impl Default for OsRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretGenerator for OsRandom {
    fn generate(&self) -> Result<String> {
        let mut buf = vec![0u8; self.bytes];
        OsRng.try_fill_bytes(&mut buf).map_err(|e| {
            tracing::error!("Entropy source failed: {}", e);
            GrantError::Internal(format!("entropy source failed: {e}"))
        })?;
        Ok(URL_SAFE_NO_PAD.encode(buf))
    }
}

/// Hash a token/code/secret for storage
pub fn hash_secret(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Constant-time string comparison
pub fn secrets_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

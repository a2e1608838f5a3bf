//! Tenant API keys: salted hashes only, plaintext never stored

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Tenant-scoped API key record. Only the salted hash of the key material is
/// persisted; the plaintext is returned exactly once at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantApiKey {
    pub key_id: Uuid,
    pub tenant_id: Uuid,
    /// Principal the key authenticates as
    pub user_id: Uuid,
    /// Human-assigned label
    pub name: String,
    /// Per-key salt, lowercase hex
    pub salt: String,
    /// `sha256(salt || key)`, lowercase hex
    pub key_hash: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TenantApiKey {
    /// Create a record from freshly generated key material.
    #[must_use]
    pub fn new(
        tenant_id: Uuid,
        user_id: Uuid,
        name: impl Into<String>,
        salt: impl Into<String>,
        plaintext: &str,
    ) -> Self {
        let salt = salt.into();
        let key_hash = Self::hash_with_salt(&salt, plaintext);
        Self {
            key_id: Uuid::new_v4(),
            tenant_id,
            user_id,
            name: name.into(),
            salt,
            key_hash,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn hash_with_salt(salt: &str, plaintext: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(plaintext.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Constant-shape verification of a presented key
    #[must_use]
    pub fn verify(&self, presented: &str) -> bool {
        if self.is_expired() {
            return false;
        }
        Self::hash_with_salt(&self.salt, presented) == self.key_hash
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| exp < Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn verify_accepts_matching_key_only() {
        let key = TenantApiKey::new(Uuid::new_v4(), Uuid::new_v4(), "ci", "a1b2", "sk-secret");
        assert!(key.verify("sk-secret"));
        assert!(!key.verify("sk-other"));
    }

    #[test]
    fn expired_keys_never_verify() {
        let key = TenantApiKey::new(Uuid::new_v4(), Uuid::new_v4(), "old", "ff00", "sk-secret")
            .with_expiry(Utc::now() - Duration::hours(1));
        assert!(!key.verify("sk-secret"));
    }
}

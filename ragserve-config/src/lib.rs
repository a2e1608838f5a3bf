//! ABOUTME: Central configuration management for ragserve
//! ABOUTME: Handles TOML parsing, discovery, and environment variable overrides

use ragserve_core::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Configuration file discovery order
const CONFIG_SEARCH_PATHS: &[&str] = &[
    "ragserve.toml",
    ".ragserve.toml",
    "config/ragserve.toml",
];

/// Environment variable prefix
const ENV_PREFIX: &str = "RAGSERVE_";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagserveConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub backends: BackendConfig,
    pub limits: LimitsConfig,
    pub search: SearchConfig,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_ip: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: "127.0.0.1".to_string(),
            port: 8900,
        }
    }
}

/// JWT validation settings. API keys need no configuration; they are verified
/// against the stored salted hashes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            jwt_issuer: "ragserve".to_string(),
        }
    }
}

/// Filesystem roots for the embedded backends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Primary root for per-tenant vector index files
    pub vector_index_root: PathBuf,
    /// Used when the primary root is not writable
    pub vector_index_fallback_root: PathBuf,
    /// Root for per-tenant object buckets
    pub object_store_root: PathBuf,
    /// Root for backup directories
    pub backup_root: PathBuf,
    /// Optional PostgreSQL connection string for the RLS-backed relational
    /// adapter (requires the `postgres` feature of ragserve-storage)
    pub postgres_url: Option<String>,
    /// Relational connection pool size
    pub pool_size: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            vector_index_root: PathBuf::from("/var/lib/ragserve/indices"),
            vector_index_fallback_root: env::temp_dir().join("ragserve-indices"),
            object_store_root: PathBuf::from("/var/lib/ragserve/objects"),
            backup_root: PathBuf::from("/var/lib/ragserve/backups"),
            postgres_url: None,
            pool_size: 16,
        }
    }
}

/// Rate limiting and audit queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Master switch for the rate-limiting pipeline stage
    pub rate_limiting_enabled: bool,
    /// Bounded audit queue; overflow drops records and bumps a counter
    pub audit_queue_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            rate_limiting_enabled: true,
            audit_queue_capacity: 1024,
        }
    }
}

/// Hybrid search tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-arm wall-clock budget
    pub arm_timeout_ms: u64,
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            arm_timeout_ms: 500,
            vector_weight: 0.6,
            keyword_weight: 0.4,
        }
    }
}

impl RagserveConfig {
    /// Load configuration: explicit path, else discovery, else defaults.
    /// Environment overrides are applied last.
    ///
    /// # Errors
    /// Returns a validation error if the file exists but does not parse.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p).await?,
            None => match Self::discover().await? {
                Some(c) => c,
                None => {
                    debug!("no configuration file found, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    async fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).await.map_err(|e| {
            RagError::validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&raw).map_err(|e| {
            RagError::validation(format!("invalid config {}: {e}", path.display()))
        })
    }

    async fn discover() -> Result<Option<Self>> {
        for candidate in CONFIG_SEARCH_PATHS {
            let path = Path::new(candidate);
            if fs::try_exists(path).await.unwrap_or(false) {
                debug!(path = %path.display(), "discovered configuration file");
                return Self::from_file(path).await.map(Some);
            }
        }
        Ok(None)
    }

    /// `RAGSERVE_`-prefixed variables override file values
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var(format!("{ENV_PREFIX}BIND_IP")) {
            self.server.bind_ip = v;
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}PORT")) {
            if let Ok(port) = v.parse() {
                self.server.port = port;
            }
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}JWT_SECRET")) {
            self.auth.jwt_secret = v;
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}JWT_ISSUER")) {
            self.auth.jwt_issuer = v;
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}VECTOR_INDEX_ROOT")) {
            self.backends.vector_index_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}OBJECT_STORE_ROOT")) {
            self.backends.object_store_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}BACKUP_ROOT")) {
            self.backends.backup_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}POSTGRES_URL")) {
            self.backends.postgres_url = Some(v);
        }
        if let Ok(v) = env::var(format!("{ENV_PREFIX}RATE_LIMITING_ENABLED")) {
            self.limits.rate_limiting_enabled = v != "false" && v != "0";
        }
    }

    fn validate(&self) -> Result<()> {
        if self.search.vector_weight < 0.0 || self.search.keyword_weight < 0.0 {
            return Err(RagError::validation("search weights must be non-negative"));
        }
        if self.search.vector_weight + self.search.keyword_weight <= 0.0 {
            return Err(RagError::validation(
                "at least one search weight must be positive",
            ));
        }
        if self.limits.audit_queue_capacity == 0 {
            return Err(RagError::validation(
                "audit_queue_capacity must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_are_valid() {
        let config = RagserveConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search.arm_timeout_ms, 500);
        assert!((config.search.vector_weight - 0.6).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn loads_partial_toml_with_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragserve.toml");
        std::fs::write(
            &path,
            "[server]\nport = 9100\n\n[search]\narm_timeout_ms = 250\n",
        )
        .unwrap();

        let config = RagserveConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.search.arm_timeout_ms, 250);
        assert!(config.limits.rate_limiting_enabled);
    }

    #[tokio::test]
    async fn invalid_toml_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ragserve.toml");
        std::fs::write(&path, "server = \"not a table\"").unwrap();

        let err = RagserveConfig::load(Some(&path)).await.unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
    }
}

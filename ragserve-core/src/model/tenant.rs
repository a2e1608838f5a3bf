//! Tenant identity, configuration, and subscription tiers

use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Subscription tiers with their built-in quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Premium,
    Enterprise,
}

impl SubscriptionTier {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }

    /// Request budget applied when the tier is assigned
    #[must_use]
    pub const fn requests_per_minute(self) -> u32 {
        match self {
            Self::Free => 60,
            Self::Basic => 300,
            Self::Premium => 1000,
            Self::Enterprise => 5000,
        }
    }

    /// Document quota for the tier, `None` meaning unlimited
    #[must_use]
    pub const fn max_documents(self) -> Option<u64> {
        match self {
            Self::Free => Some(1_000),
            Self::Basic => Some(25_000),
            Self::Premium => Some(250_000),
            Self::Enterprise => None,
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionTier {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "basic" => Ok(Self::Basic),
            "premium" => Ok(Self::Premium),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(RagError::validation_field(
                format!("invalid subscription tier: {other}"),
                "tier",
            )),
        }
    }
}

/// Tenant record. Soft delete sets `deleted_at` and begins the recovery
/// window; hard delete removes the row after the per-backend cleanup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub name: String,
    /// Globally unique when present
    pub domain: Option<String>,
    pub tier: SubscriptionTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Tenant {
    #[must_use]
    pub fn new(name: impl Into<String>, tier: SubscriptionTier) -> Self {
        let now = Utc::now();
        Self {
            tenant_id: Uuid::new_v4(),
            name: name.into(),
            domain: None,
            tier,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Rate-limit configuration carried in the tenant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: SubscriptionTier::Free.requests_per_minute(),
        }
    }
}

/// 1:1 companion to `Tenant`: model selection, compliance and isolation
/// flags, rate limits, and free-form custom configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfiguration {
    pub tenant_id: Uuid,
    pub template_name: Option<String>,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub llm_model: String,
    pub compliance_flags: Vec<String>,
    pub rate_limit: RateLimitConfig,
    pub data_isolation_enabled: bool,
    pub audit_logging_enabled: bool,
    pub custom: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantConfiguration {
    /// Baseline configuration for a fresh tenant
    #[must_use]
    pub fn new(tenant_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            tenant_id,
            template_name: None,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimension: 384,
            llm_model: "gpt-4o-mini".to_string(),
            compliance_flags: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            data_isolation_enabled: true,
            audit_logging_enabled: true,
            custom: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the quotas a tier grants
    pub fn apply_tier(&mut self, tier: SubscriptionTier) {
        self.rate_limit.requests_per_minute = tier.requests_per_minute();
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parsing_and_quotas() {
        assert_eq!(
            "Enterprise".parse::<SubscriptionTier>().unwrap(),
            SubscriptionTier::Enterprise
        );
        assert!("platinum".parse::<SubscriptionTier>().is_err());
        assert!(
            SubscriptionTier::Premium.requests_per_minute()
                > SubscriptionTier::Free.requests_per_minute()
        );
    }

    #[test]
    fn apply_tier_updates_rate_limit() {
        let mut config = TenantConfiguration::new(Uuid::new_v4());
        config.apply_tier(SubscriptionTier::Enterprise);
        assert_eq!(
            config.rate_limit.requests_per_minute,
            SubscriptionTier::Enterprise.requests_per_minute()
        );
    }
}

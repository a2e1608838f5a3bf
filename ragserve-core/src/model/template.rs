//! Tenant templates for domain-specific provisioning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Business domain a template targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainType {
    Fintech,
    Healthcare,
    Retail,
    CustomerService,
    Custom,
}

impl DomainType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fintech => "fintech",
            Self::Healthcare => "healthcare",
            Self::Retail => "retail",
            Self::CustomerService => "customer_service",
            Self::Custom => "custom",
        }
    }
}

/// Globally unique (by name) provisioning template. Immutable once created,
/// excluding administrative correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: Uuid,
    pub name: String,
    pub domain: DomainType,
    pub description: String,
    pub compliance_checklist: Vec<String>,
    pub default_configuration: HashMap<String, serde_json::Value>,
    pub customization_options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Template {
    #[must_use]
    pub fn new(name: impl Into<String>, domain: DomainType, description: impl Into<String>) -> Self {
        Self {
            template_id: Uuid::new_v4(),
            name: name.into(),
            domain,
            description: description.into(),
            compliance_checklist: Vec::new(),
            default_configuration: HashMap::new(),
            customization_options: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_compliance(mut self, items: Vec<String>) -> Self {
        self.compliance_checklist = items;
        self
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: HashMap<String, serde_json::Value>) -> Self {
        self.default_configuration = defaults;
        self
    }

    #[must_use]
    pub fn with_customization(mut self, options: Vec<String>) -> Self {
        self.customization_options = options;
        self
    }
}

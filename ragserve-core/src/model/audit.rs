//! Immutable, append-only audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One audit record. Retention survives tenant deletion; `tenant_id` is
/// nullable for system-level events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub log_id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Tool name or administrative verb
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    /// Role, auth method, success flag, IP, session, timings, truncated result
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    #[must_use]
    pub fn new(action: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            log_id: Uuid::new_v4(),
            tenant_id: None,
            user_id: None,
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: None,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub const fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub const fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// `success` flag out of the details map, defaulting to true
    #[must_use]
    pub fn success(&self) -> bool {
        self.details
            .get("success")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(true)
    }
}

/// Filterable query over the audit log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditQuery {
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Exact action match
    pub action: Option<String>,
    /// Prefix match, used by analytics aggregation (`rag_`, `mem0_`)
    pub action_prefix: Option<String>,
    pub success: Option<bool>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl AuditQuery {
    #[must_use]
    pub fn for_tenant(tenant_id: Uuid) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            limit: 100,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(t) = self.tenant_id {
            if record.tenant_id != Some(t) {
                return false;
            }
        }
        if let Some(u) = self.user_id {
            if record.user_id != Some(u) {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if record.action != *action {
                return false;
            }
        }
        if let Some(prefix) = &self.action_prefix {
            if !record.action.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(success) = self.success {
            if record.success() != success {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.timestamp > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_filters_by_action_prefix_and_success() {
        let tenant = Uuid::new_v4();
        let record = AuditRecord::new("rag_search", "search")
            .with_tenant(tenant)
            .with_details(json!({"success": false}));

        let mut query = AuditQuery::for_tenant(tenant);
        query.action_prefix = Some("rag_".to_string());
        query.success = Some(false);
        assert!(query.matches(&record));

        query.success = Some(true);
        assert!(!query.matches(&record));

        query.success = None;
        query.action_prefix = Some("mem0_".to_string());
        assert!(!query.matches(&record));
    }
}

//! Per-user memory entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One `(tenant, user, key)` memory slot. Callers may only address their own
/// `user_id`; admins may address users inside their tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    #[must_use]
    pub fn new(tenant_id: Uuid, user_id: Uuid, key: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tenant_id,
            user_id,
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }
}

//! Per-tenant keyword index trait

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Document shape handed to the keyword index. `content`, `title`, and
/// `metadata` are searchable; `tenant_id` is a mandatory filter attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordDocument {
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub content: String,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Engine-side filters. The date range is applied post-query by the search
/// service; the engine does not evaluate date predicates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordFilter {
    /// Matches `metadata.type`
    pub document_type: Option<String>,
    /// `metadata.tags IN [...]` semantics: any overlap matches
    pub tags: Vec<String>,
    /// Applied post-query against the relational record
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl KeywordFilter {
    /// Engine-evaluated part of the filter (type and tags)
    #[must_use]
    pub fn matches_metadata(&self, metadata: &HashMap<String, serde_json::Value>) -> bool {
        if let Some(doc_type) = &self.document_type {
            let actual = metadata.get("type").and_then(|v| v.as_str());
            if actual != Some(doc_type.as_str()) {
                return false;
            }
        }
        if !self.tags.is_empty() {
            let doc_tags: Vec<&str> = metadata
                .get("tags")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            if !self.tags.iter().any(|t| doc_tags.contains(&t.as_str())) {
                return false;
            }
        }
        true
    }
}

/// One logical index per tenant, named `tenant-{tenant_id}`. Every search is
/// issued with the tenant filter; the adapter rejects cross-tenant access
/// against the request context.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Resolve the tenant's index, creating it on demand. Returns its name.
    async fn ensure_index(&self, tenant_id: Uuid) -> Result<String>;

    async fn add_document(&self, doc: KeywordDocument) -> Result<()>;
    async fn remove_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()>;

    /// Ranked search: `(document_id, relevance)` with relevance in `[0, 1]`,
    /// best-first
    async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        k: usize,
        filter: &KeywordFilter,
    ) -> Result<Vec<(Uuid, f32)>>;

    async fn delete_index(&self, tenant_id: Uuid) -> Result<()>;
    async fn document_count(&self, tenant_id: Uuid) -> Result<usize>;

    /// All indexed documents, for backup
    async fn export_documents(&self, tenant_id: Uuid) -> Result<Vec<KeywordDocument>>;
    /// Bulk load, for restore
    async fn import_documents(&self, tenant_id: Uuid, docs: Vec<KeywordDocument>) -> Result<()>;
}

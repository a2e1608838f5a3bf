//! Documents and their append-only version history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

/// SHA-256 of the canonical content bytes, lowercase hex.
///
/// Every producer of a `content_hash` (ingestion dedup, version snapshots,
/// backup checksums over document dumps) derives it through here.
#[must_use]
pub fn hash_content(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Tenant- and user-scoped document.
///
/// `(tenant_id, content_hash)` is unique among non-deleted documents. A set
/// `deleted_at` excludes the document from search and retrieval while the
/// object bytes are retained for the recovery window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    /// SHA-256 of the canonical content bytes, lowercase hex
    pub content_hash: String,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Monotonic per document, starts at 1
    pub version_number: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Document {
    #[must_use]
    pub fn new(
        tenant_id: Uuid,
        user_id: Uuid,
        title: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            document_id: Uuid::new_v4(),
            tenant_id,
            user_id,
            title: title.into(),
            content_hash: content_hash.into(),
            metadata: HashMap::new(),
            version_number: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Metadata `type` field, used by list and keyword filters
    #[must_use]
    pub fn document_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }
}

/// Append-only snapshot of a document state prior to re-ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub version_id: Uuid,
    pub document_id: Uuid,
    pub tenant_id: Uuid,
    pub version_number: u32,
    pub content_hash: String,
    pub created_by: Uuid,
    pub change_summary: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl DocumentVersion {
    /// Snapshot the current state of `doc` before it is replaced
    #[must_use]
    pub fn snapshot(doc: &Document, created_by: Uuid, change_summary: Option<String>) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            document_id: doc.document_id,
            tenant_id: doc.tenant_id,
            version_number: doc.version_number,
            content_hash: doc.content_hash.clone(),
            created_by,
            change_summary,
            metadata: doc.metadata.clone(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_content_is_lowercase_hex_sha256() {
        // SHA-256("hello") reference digest
        assert_eq!(
            hash_content(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn snapshot_preserves_prior_state() {
        let doc = Document::new(Uuid::new_v4(), Uuid::new_v4(), "title", "abc123");
        let version = DocumentVersion::snapshot(&doc, doc.user_id, Some("initial".into()));
        assert_eq!(version.version_number, 1);
        assert_eq!(version.content_hash, "abc123");
        assert_eq!(version.document_id, doc.document_id);
    }
}

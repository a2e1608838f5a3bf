//! Typed repository traits over the relational store.
//!
//! The embedded in-memory backend implements all of these; the `postgres`
//! feature of `ragserve-storage` provides the RLS-backed implementation.
//! Every method that addresses a tenant validates it against the request
//! context inside the adapter.

use crate::error::Result;
use crate::model::api_key::TenantApiKey;
use crate::model::audit::{AuditQuery, AuditRecord};
use crate::model::document::{Document, DocumentVersion};
use crate::model::memory::MemoryEntry;
use crate::model::template::Template;
use crate::model::tenant::{Tenant, TenantConfiguration};
use crate::model::user::User;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Tenants and their 1:1 configuration
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert_tenant(&self, tenant: Tenant) -> Result<()>;
    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>>;
    async fn get_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>>;
    async fn list_tenants(&self) -> Result<Vec<Tenant>>;
    async fn update_tenant(&self, tenant: Tenant) -> Result<()>;
    /// Remove the tenant row itself (hard delete, after backend cleanup)
    async fn remove_tenant(&self, tenant_id: Uuid) -> Result<()>;

    async fn insert_config(&self, config: TenantConfiguration) -> Result<()>;
    async fn get_config(&self, tenant_id: Uuid) -> Result<Option<TenantConfiguration>>;
    async fn update_config(&self, config: TenantConfiguration) -> Result<()>;
}

/// Provisioning templates, globally unique by name
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn upsert_template(&self, template: Template) -> Result<()>;
    async fn get_template(&self, name: &str) -> Result<Option<Template>>;
    async fn list_templates(&self) -> Result<Vec<Template>>;
}

/// Tenant-scoped users
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: User) -> Result<()>;
    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>>;
    async fn remove_users_for_tenant(&self, tenant_id: Uuid) -> Result<usize>;
}

/// Listing filters for `rag_list_documents`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    /// Matches `metadata.type`
    pub document_type: Option<String>,
    /// Matches `metadata.source`
    pub source: Option<String>,
    /// Case-insensitive substring over the title
    pub title_contains: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl DocumentFilter {
    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        if let Some(doc_type) = &self.document_type {
            if doc.document_type() != Some(doc_type.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source {
            let doc_source = doc.metadata.get("source").and_then(|v| v.as_str());
            if doc_source != Some(source.as_str()) {
                return false;
            }
        }
        if let Some(needle) = &self.title_contains {
            if !doc
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(after) = self.created_after {
            if doc.created_at < after {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if doc.created_at > before {
                return false;
            }
        }
        true
    }
}

/// Documents and their version history
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> Result<()>;
    async fn get_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Option<Document>>;
    /// Dedup lookup over non-deleted documents
    async fn find_by_hash(&self, tenant_id: Uuid, content_hash: &str) -> Result<Option<Document>>;
    /// Paginated listing, excluding soft-deleted. Returns `(page, total)`.
    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Document>, usize)>;
    /// All non-deleted documents, used for vector ID resolution and rebuilds
    async fn enumerate_documents(&self, tenant_id: Uuid) -> Result<Vec<Document>>;
    async fn update_document(&self, document: Document) -> Result<()>;
    async fn count_documents(&self, tenant_id: Uuid) -> Result<usize>;
    async fn remove_documents_for_tenant(&self, tenant_id: Uuid) -> Result<usize>;

    async fn insert_version(&self, version: DocumentVersion) -> Result<()>;
    /// Versions ordered by `version_number` ascending
    async fn list_versions(&self, tenant_id: Uuid, document_id: Uuid)
        -> Result<Vec<DocumentVersion>>;
}

/// Append-only audit log
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<()>;
    /// Matching records, newest first, honoring `limit`/`offset`.
    /// Returns `(page, total_matching)`.
    async fn query(&self, query: &AuditQuery) -> Result<(Vec<AuditRecord>, usize)>;
}

/// Tenant API keys
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn insert_key(&self, key: TenantApiKey) -> Result<()>;
    /// All keys across tenants; authentication iterates and verifies against
    /// the salted hashes
    async fn all_keys(&self) -> Result<Vec<TenantApiKey>>;
    async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<TenantApiKey>>;
    async fn remove_keys_for_tenant(&self, tenant_id: Uuid) -> Result<usize>;
}

/// Per-user memory slots
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn put(&self, entry: MemoryEntry) -> Result<()>;
    async fn get(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<Option<MemoryEntry>>;
    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<bool>;
    async fn list(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<MemoryEntry>>;
    /// Case-insensitive substring search over keys and stringified values
    async fn search(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>>;
    async fn remove_for_tenant(&self, tenant_id: Uuid) -> Result<usize>;
}

/// Bundle of repository handles handed to services and tool handlers
#[derive(Clone)]
pub struct Repositories {
    pub tenants: Arc<dyn TenantStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub users: Arc<dyn UserStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub audit: Arc<dyn AuditStore>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub memory: Arc<dyn MemoryStore>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}

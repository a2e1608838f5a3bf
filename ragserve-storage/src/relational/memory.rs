//! Embedded in-memory relational backend.
//!
//! Default backend for development and tests, and the reference for the
//! tenant-isolation semantics the postgres adapter enforces through RLS.
//! Platform-level lookups (tenants, templates, users, API keys) carry no
//! tenant guard; they run before tenant extraction or under admin tools.
//! Data-plane tables (documents, memory) validate the addressed tenant
//! against the request context on every call.

use async_trait::async_trait;
use ragserve_core::context::check_resource_tenant;
use ragserve_core::model::api_key::TenantApiKey;
use ragserve_core::model::audit::{AuditQuery, AuditRecord};
use ragserve_core::model::document::{Document, DocumentVersion};
use ragserve_core::model::memory::MemoryEntry;
use ragserve_core::model::template::Template;
use ragserve_core::model::tenant::{Tenant, TenantConfiguration};
use ragserve_core::model::user::User;
use ragserve_core::traits::relational::{
    ApiKeyStore, AuditStore, DocumentFilter, DocumentStore, MemoryStore, Repositories,
    TemplateStore, TenantStore, UserStore,
};
use ragserve_core::{RagError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process relational store
#[derive(Default)]
pub struct MemoryRelational {
    tenants: RwLock<HashMap<Uuid, Tenant>>,
    configs: RwLock<HashMap<Uuid, TenantConfiguration>>,
    templates: RwLock<HashMap<String, Template>>,
    users: RwLock<HashMap<Uuid, User>>,
    documents: RwLock<HashMap<Uuid, Document>>,
    versions: RwLock<Vec<DocumentVersion>>,
    audit: RwLock<Vec<AuditRecord>>,
    api_keys: RwLock<HashMap<Uuid, TenantApiKey>>,
    memory: RwLock<HashMap<(Uuid, Uuid, String), MemoryEntry>>,
}

impl MemoryRelational {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Repository bundle backed by this store
    #[must_use]
    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            tenants: self.clone(),
            templates: self.clone(),
            users: self.clone(),
            documents: self.clone(),
            audit: self.clone(),
            api_keys: self.clone(),
            memory: self.clone(),
        }
    }
}

impl std::fmt::Debug for MemoryRelational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRelational").finish_non_exhaustive()
    }
}

#[async_trait]
impl TenantStore for MemoryRelational {
    async fn insert_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        if tenants
            .values()
            .any(|t| t.name == tenant.name && !t.is_deleted())
        {
            return Err(RagError::conflict(format!(
                "tenant with name {} already exists",
                tenant.name
            )));
        }
        if let Some(domain) = &tenant.domain {
            if tenants
                .values()
                .any(|t| t.domain.as_deref() == Some(domain.as_str()) && !t.is_deleted())
            {
                return Err(RagError::conflict(format!(
                    "tenant domain {domain} already registered"
                )));
            }
        }
        tenants.insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        Ok(self.tenants.read().await.get(&tenant_id).cloned())
    }

    async fn get_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut tenants: Vec<Tenant> = self.tenants.read().await.values().cloned().collect();
        tenants.sort_by_key(|t| t.created_at);
        Ok(tenants)
    }

    async fn update_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut tenants = self.tenants.write().await;
        if !tenants.contains_key(&tenant.tenant_id) {
            return Err(RagError::not_found(format!(
                "tenant {} not found",
                tenant.tenant_id
            )));
        }
        tenants.insert(tenant.tenant_id, tenant);
        Ok(())
    }

    async fn remove_tenant(&self, tenant_id: Uuid) -> Result<()> {
        self.tenants.write().await.remove(&tenant_id);
        self.configs.write().await.remove(&tenant_id);
        Ok(())
    }

    async fn insert_config(&self, config: TenantConfiguration) -> Result<()> {
        self.configs.write().await.insert(config.tenant_id, config);
        Ok(())
    }

    async fn get_config(&self, tenant_id: Uuid) -> Result<Option<TenantConfiguration>> {
        Ok(self.configs.read().await.get(&tenant_id).cloned())
    }

    async fn update_config(&self, config: TenantConfiguration) -> Result<()> {
        let mut configs = self.configs.write().await;
        if !configs.contains_key(&config.tenant_id) {
            return Err(RagError::not_found(format!(
                "configuration for tenant {} not found",
                config.tenant_id
            )));
        }
        configs.insert(config.tenant_id, config);
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for MemoryRelational {
    async fn upsert_template(&self, template: Template) -> Result<()> {
        self.templates
            .write()
            .await
            .insert(template.name.clone(), template);
        Ok(())
    }

    async fn get_template(&self, name: &str) -> Result<Option<Template>> {
        Ok(self.templates.read().await.get(name).cloned())
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        let mut templates: Vec<Template> =
            self.templates.read().await.values().cloned().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }
}

#[async_trait]
impl UserStore for MemoryRelational {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(RagError::conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        users.insert(user.user_id, user);
        Ok(())
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn remove_users_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|_, u| u.tenant_id != tenant_id);
        Ok(before - users.len())
    }
}

#[async_trait]
impl DocumentStore for MemoryRelational {
    async fn insert_document(&self, document: Document) -> Result<()> {
        check_resource_tenant(document.tenant_id)?;
        self.documents
            .write()
            .await
            .insert(document.document_id, document);
        Ok(())
    }

    async fn get_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Option<Document>> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .documents
            .read()
            .await
            .get(&document_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_by_hash(&self, tenant_id: Uuid, content_hash: &str) -> Result<Option<Document>> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .documents
            .read()
            .await
            .values()
            .find(|d| {
                d.tenant_id == tenant_id && d.content_hash == content_hash && !d.is_deleted()
            })
            .cloned())
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Document>, usize)> {
        check_resource_tenant(tenant_id)?;
        let mut matching: Vec<Document> = self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.tenant_id == tenant_id && !d.is_deleted() && filter.matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn enumerate_documents(&self, tenant_id: Uuid) -> Result<Vec<Document>> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.tenant_id == tenant_id && !d.is_deleted())
            .cloned()
            .collect())
    }

    async fn update_document(&self, document: Document) -> Result<()> {
        check_resource_tenant(document.tenant_id)?;
        let mut documents = self.documents.write().await;
        if !documents.contains_key(&document.document_id) {
            return Err(RagError::not_found(format!(
                "document {} not found",
                document.document_id
            )));
        }
        documents.insert(document.document_id, document);
        Ok(())
    }

    async fn count_documents(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .documents
            .read()
            .await
            .values()
            .filter(|d| d.tenant_id == tenant_id && !d.is_deleted())
            .count())
    }

    async fn remove_documents_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, d| d.tenant_id != tenant_id);
        let removed = before - documents.len();
        self.versions
            .write()
            .await
            .retain(|v| v.tenant_id != tenant_id);
        Ok(removed)
    }

    async fn insert_version(&self, version: DocumentVersion) -> Result<()> {
        check_resource_tenant(version.tenant_id)?;
        self.versions.write().await.push(version);
        Ok(())
    }

    async fn list_versions(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersion>> {
        check_resource_tenant(tenant_id)?;
        let mut versions: Vec<DocumentVersion> = self
            .versions
            .read()
            .await
            .iter()
            .filter(|v| v.tenant_id == tenant_id && v.document_id == document_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }
}

#[async_trait]
impl AuditStore for MemoryRelational {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        self.audit.write().await.push(record);
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<(Vec<AuditRecord>, usize)> {
        let mut matching: Vec<AuditRecord> = self
            .audit
            .read()
            .await
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let total = matching.len();
        let limit = if query.limit == 0 { total } else { query.limit };
        let page = matching.into_iter().skip(query.offset).take(limit).collect();
        Ok((page, total))
    }
}

#[async_trait]
impl ApiKeyStore for MemoryRelational {
    async fn insert_key(&self, key: TenantApiKey) -> Result<()> {
        self.api_keys.write().await.insert(key.key_id, key);
        Ok(())
    }

    async fn all_keys(&self) -> Result<Vec<TenantApiKey>> {
        Ok(self.api_keys.read().await.values().cloned().collect())
    }

    async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<TenantApiKey>> {
        Ok(self
            .api_keys
            .read()
            .await
            .values()
            .filter(|k| k.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn remove_keys_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut keys = self.api_keys.write().await;
        let before = keys.len();
        keys.retain(|_, k| k.tenant_id != tenant_id);
        Ok(before - keys.len())
    }
}

#[async_trait]
impl MemoryStore for MemoryRelational {
    async fn put(&self, entry: MemoryEntry) -> Result<()> {
        check_resource_tenant(entry.tenant_id)?;
        self.memory
            .write()
            .await
            .insert((entry.tenant_id, entry.user_id, entry.key.clone()), entry);
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<Option<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .memory
            .read()
            .await
            .get(&(tenant_id, user_id, key.to_string()))
            .cloned())
    }

    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<bool> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .memory
            .write()
            .await
            .remove(&(tenant_id, user_id, key.to_string()))
            .is_some())
    }

    async fn list(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        let mut entries: Vec<MemoryEntry> = self
            .memory
            .read()
            .await
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        let needle = query.to_lowercase();
        let mut entries: Vec<MemoryEntry> = self
            .memory
            .read()
            .await
            .values()
            .filter(|e| {
                e.tenant_id == tenant_id
                    && e.user_id == user_id
                    && (e.key.to_lowercase().contains(&needle)
                        || e.value.to_string().to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn remove_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut memory = self.memory.write().await;
        let before = memory.len();
        memory.retain(|_, e| e.tenant_id != tenant_id);
        Ok(before - memory.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::context::{scope, RequestContext};
    use ragserve_core::model::user::Role;

    fn ctx(tenant: Uuid) -> RequestContext {
        RequestContext::new()
            .with_tenant(tenant)
            .with_role(Role::TenantAdmin)
    }

    #[tokio::test]
    async fn document_access_requires_matching_tenant_context() {
        let store = MemoryRelational::new();
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let user = Uuid::new_v4();

        let doc = Document::new(tenant, user, "alpha", "hash-a");
        let doc_id = doc.document_id;

        scope(ctx(tenant), async {
            store.insert_document(doc).await.unwrap();
            assert!(store.get_document(tenant, doc_id).await.unwrap().is_some());
        })
        .await;

        scope(ctx(other), async {
            let err = store.get_document(tenant, doc_id).await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::TenantIsolation);
        })
        .await;
    }

    #[tokio::test]
    async fn duplicate_tenant_name_conflicts() {
        let store = MemoryRelational::new();
        let t1 = Tenant::new("acme", ragserve_core::SubscriptionTier::Free);
        let t2 = Tenant::new("acme", ragserve_core::SubscriptionTier::Basic);
        store.insert_tenant(t1).await.unwrap();
        let err = store.insert_tenant(t2).await.unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn soft_deleted_documents_are_excluded_from_listing() {
        let store = MemoryRelational::new();
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();

        scope(ctx(tenant), async {
            let mut doc = Document::new(tenant, user, "alpha", "h1");
            let keep = Document::new(tenant, user, "beta", "h2");
            doc.deleted_at = Some(chrono::Utc::now());
            store.insert_document(doc).await.unwrap();
            store.insert_document(keep).await.unwrap();

            let (page, total) = store
                .list_documents(tenant, &DocumentFilter::default(), 10, 0)
                .await
                .unwrap();
            assert_eq!(total, 1);
            assert_eq!(page[0].title, "beta");
            assert_eq!(store.count_documents(tenant).await.unwrap(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn audit_query_paginates_newest_first() {
        let store = MemoryRelational::new();
        let tenant = Uuid::new_v4();
        for i in 0..5 {
            store
                .append(
                    AuditRecord::new(format!("rag_tool_{i}"), "test").with_tenant(tenant),
                )
                .await
                .unwrap();
        }
        let mut query = AuditQuery::for_tenant(tenant);
        query.limit = 2;
        query.offset = 0;
        let (page, total) = store.query(&query).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert!(page[0].timestamp >= page[1].timestamp);
    }
}

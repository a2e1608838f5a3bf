//! Tenant lifecycle: registration, deletion, tiers, resource provisioning.

use crate::templates::builtin_templates;
use crate::usage::TenantUsageMetrics;
use chrono::Utc;
use ragserve_core::model::api_key::TenantApiKey;
use ragserve_core::model::tenant::{SubscriptionTier, Tenant, TenantConfiguration};
use ragserve_core::model::user::{Role, User};
use ragserve_core::traits::keyword::KeywordIndex;
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::{
    ApiKeyStore, DocumentStore, MemoryStore, Repositories, TemplateStore, TenantStore, UserStore,
};
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::{RagError, Result};
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a successful registration. The API key plaintext appears here
/// exactly once; only its salted hash is stored.
#[derive(Debug, Clone)]
pub struct RegisteredTenant {
    pub tenant: Tenant,
    pub admin_user: User,
    pub api_key_id: Uuid,
    pub api_key: String,
}

/// Owns tenant lifecycle and the per-tenant backend resources
pub struct TenantManager {
    repos: Repositories,
    vector: Arc<dyn VectorIndex>,
    objects: Arc<dyn ObjectStore>,
    keyword: Arc<dyn KeywordIndex>,
    usage: RwLock<HashMap<Uuid, TenantUsageMetrics>>,
}

impl std::fmt::Debug for TenantManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantManager").finish_non_exhaustive()
    }
}

impl TenantManager {
    #[must_use]
    pub fn new(
        repos: Repositories,
        vector: Arc<dyn VectorIndex>,
        objects: Arc<dyn ObjectStore>,
        keyword: Arc<dyn KeywordIndex>,
    ) -> Self {
        Self {
            repos,
            vector,
            objects,
            keyword,
            usage: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the built-in template catalog. Idempotent.
    pub async fn seed_templates(&self) -> Result<()> {
        for template in builtin_templates() {
            if self.repos.templates.get_template(&template.name).await?.is_none() {
                self.repos.templates.upsert_template(template).await?;
            }
        }
        Ok(())
    }

    /// Register a tenant from a template: relational rows, admin user, API
    /// key, and all four backend resources. A tenant is never partially
    /// created; any provisioning failure rolls the registration back.
    pub async fn register_tenant(
        &self,
        name: &str,
        template_name: &str,
        domain: Option<String>,
        tier: SubscriptionTier,
        admin_email: &str,
    ) -> Result<RegisteredTenant> {
        if name.trim().is_empty() {
            return Err(RagError::validation_field(
                "tenant name cannot be empty",
                "tenant_name",
            ));
        }
        let template = self
            .repos
            .templates
            .get_template(template_name)
            .await?
            .ok_or_else(|| RagError::not_found(format!("template {template_name} not found")))?;

        let mut tenant = Tenant::new(name, tier);
        if let Some(domain) = domain {
            tenant = tenant.with_domain(domain);
        }
        let tenant_id = tenant.tenant_id;

        let mut config = TenantConfiguration::new(tenant_id);
        config.template_name = Some(template.name.clone());
        if let Some(model) = template
            .default_configuration
            .get("embedding_model")
            .and_then(|v| v.as_str())
        {
            config.embedding_model = model.to_string();
        }
        if let Some(dim) = template
            .default_configuration
            .get("embedding_dimension")
            .and_then(serde_json::Value::as_u64)
        {
            config.embedding_dimension = usize::try_from(dim)
                .map_err(|_| RagError::validation("embedding_dimension out of range"))?;
        }
        if let Some(model) = template
            .default_configuration
            .get("llm_model")
            .and_then(|v| v.as_str())
        {
            config.llm_model = model.to_string();
        }
        config.compliance_flags = template.compliance_checklist.clone();
        config.apply_tier(tier);

        self.repos.tenants.insert_tenant(tenant.clone()).await?;
        self.repos.tenants.insert_config(config.clone()).await?;

        let admin_user = User::new(tenant_id, admin_email, Role::TenantAdmin);
        if let Err(err) = self.repos.users.insert_user(admin_user.clone()).await {
            self.repos.tenants.remove_tenant(tenant_id).await?;
            return Err(err);
        }

        let (api_key, key_record) = Self::generate_api_key(tenant_id, admin_user.user_id);
        let api_key_id = key_record.key_id;
        self.repos.api_keys.insert_key(key_record).await?;

        // Provision the per-tenant backend resources; unwind on failure so
        // registration stays all-or-nothing
        if let Err(err) = self.provision_backends(tenant_id, config.embedding_dimension).await {
            warn!(tenant_id = %tenant_id, error = %err, "provisioning failed, rolling back registration");
            self.teardown_backends(tenant_id).await;
            self.repos.api_keys.remove_keys_for_tenant(tenant_id).await?;
            self.repos.users.remove_users_for_tenant(tenant_id).await?;
            self.repos.tenants.remove_tenant(tenant_id).await?;
            return Err(err);
        }

        info!(
            tenant_id = %tenant_id,
            name = %tenant.name,
            template = %template.name,
            tier = %tenant.tier,
            "registered tenant"
        );
        Ok(RegisteredTenant {
            tenant,
            admin_user,
            api_key_id,
            api_key,
        })
    }

    async fn provision_backends(&self, tenant_id: Uuid, dimension: usize) -> Result<()> {
        self.vector.create(tenant_id, dimension).await?;
        self.objects.ensure_bucket(tenant_id).await?;
        self.keyword.ensure_index(tenant_id).await?;
        Ok(())
    }

    async fn teardown_backends(&self, tenant_id: Uuid) {
        if let Err(err) = self.vector.delete(tenant_id).await {
            warn!(tenant_id = %tenant_id, error = %err, "vector teardown failed");
        }
        if let Err(err) = self.objects.delete_bucket(tenant_id).await {
            warn!(tenant_id = %tenant_id, error = %err, "bucket teardown failed");
        }
        if let Err(err) = self.keyword.delete_index(tenant_id).await {
            warn!(tenant_id = %tenant_id, error = %err, "keyword teardown failed");
        }
    }

    fn generate_api_key(tenant_id: Uuid, user_id: Uuid) -> (String, TenantApiKey) {
        let mut rng = rand::thread_rng();
        let mut key_bytes = [0u8; 24];
        rng.fill_bytes(&mut key_bytes);
        let plaintext = format!("rsk-{}", hex::encode(key_bytes));

        let mut salt_bytes = [0u8; 8];
        rng.fill_bytes(&mut salt_bytes);
        let salt = hex::encode(salt_bytes);

        let record = TenantApiKey::new(tenant_id, user_id, "default", salt, &plaintext);
        (plaintext, record)
    }

    /// Resolve a live (not soft-deleted) tenant
    pub async fn require_active_tenant(&self, tenant_id: Uuid) -> Result<Tenant> {
        let tenant = self
            .repos
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| RagError::not_found(format!("tenant {tenant_id} not found")))?;
        if tenant.is_deleted() {
            return Err(RagError::not_found(format!(
                "tenant {tenant_id} is deleted"
            )));
        }
        Ok(tenant)
    }

    /// Soft delete: tombstone the tenant and start the recovery window.
    /// Backend resources and rows are retained.
    pub async fn soft_delete(&self, tenant_id: Uuid) -> Result<Tenant> {
        let mut tenant = self.require_active_tenant(tenant_id).await?;
        tenant.deleted_at = Some(Utc::now());
        tenant.updated_at = Utc::now();
        self.repos.tenants.update_tenant(tenant.clone()).await?;
        info!(tenant_id = %tenant_id, "tenant soft-deleted");
        Ok(tenant)
    }

    /// Hard delete: remove the tenant's resources across all four backends
    /// and the relational rows. Audit records are retained per compliance.
    /// Callers are responsible for the safety backup beforehand.
    pub async fn hard_delete(&self, tenant_id: Uuid) -> Result<()> {
        let tenant = self
            .repos
            .tenants
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| RagError::not_found(format!("tenant {tenant_id} not found")))?;

        self.teardown_backends(tenant_id).await;
        self.repos
            .documents
            .remove_documents_for_tenant(tenant_id)
            .await?;
        self.repos.memory.remove_for_tenant(tenant_id).await?;
        self.repos.api_keys.remove_keys_for_tenant(tenant_id).await?;
        self.repos.users.remove_users_for_tenant(tenant_id).await?;
        self.repos.tenants.remove_tenant(tenant_id).await?;
        self.usage.write().await.remove(&tenant_id);

        info!(tenant_id = %tenant_id, name = %tenant.name, "tenant hard-deleted");
        Ok(())
    }

    /// Change the subscription tier, rewriting the tier quotas into the
    /// tenant configuration and rate-limit configuration.
    pub async fn update_tier(&self, tenant_id: Uuid, tier: SubscriptionTier) -> Result<Tenant> {
        let mut tenant = self.require_active_tenant(tenant_id).await?;
        tenant.tier = tier;
        tenant.updated_at = Utc::now();
        self.repos.tenants.update_tenant(tenant.clone()).await?;

        if let Some(mut config) = self.repos.tenants.get_config(tenant_id).await? {
            config.apply_tier(tier);
            self.repos.tenants.update_config(config).await?;
        }
        info!(tenant_id = %tenant_id, tier = %tier, "subscription tier updated");
        Ok(tenant)
    }

    /// Usage metrics snapshot for a tenant
    pub async fn usage(&self, tenant_id: Uuid) -> TenantUsageMetrics {
        self.usage
            .read()
            .await
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn record_search(&self, tenant_id: Uuid) {
        let mut usage = self.usage.write().await;
        usage.entry(tenant_id).or_default().add_search_usage();
    }

    pub async fn record_embedding(&self, tenant_id: Uuid) {
        let mut usage = self.usage.write().await;
        usage.entry(tenant_id).or_default().add_embedding_usage();
    }

    pub async fn record_document(&self, tenant_id: Uuid, storage_bytes: u64) {
        let mut usage = self.usage.write().await;
        usage
            .entry(tenant_id)
            .or_default()
            .add_document_usage(storage_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::context::{scope, RequestContext};
    use ragserve_core::traits::vector::DistanceMetric;
    use ragserve_storage::{FlatVectorIndex, FsObjectStore, MemoryKeywordIndex, MemoryRelational};

    fn uber_ctx() -> RequestContext {
        RequestContext::new().with_role(Role::UberAdmin)
    }

    fn manager(dir: &tempfile::TempDir) -> TenantManager {
        let relational = MemoryRelational::new();
        TenantManager::new(
            relational.repositories(),
            Arc::new(
                FlatVectorIndex::open(
                    &dir.path().join("indices"),
                    &dir.path().join("indices-fallback"),
                    DistanceMetric::L2,
                )
                .unwrap(),
            ),
            Arc::new(FsObjectStore::open(&dir.path().join("objects")).unwrap()),
            Arc::new(MemoryKeywordIndex::new()),
        )
    }

    #[tokio::test]
    async fn register_creates_tenant_config_user_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);

        scope(uber_ctx(), async {
            mgr.seed_templates().await.unwrap();
            let registered = mgr
                .register_tenant(
                    "acme",
                    "retail-catalog",
                    Some("acme.example".to_string()),
                    SubscriptionTier::Basic,
                    "admin@acme.example",
                )
                .await
                .unwrap();

            assert!(registered.api_key.starts_with("rsk-"));
            assert_eq!(registered.admin_user.role, Role::TenantAdmin);
            let tenant = mgr
                .require_active_tenant(registered.tenant.tenant_id)
                .await
                .unwrap();
            assert_eq!(tenant.tier, SubscriptionTier::Basic);
        })
        .await;
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);

        scope(uber_ctx(), async {
            let err = mgr
                .register_tenant("acme", "no-such", None, SubscriptionTier::Free, "a@b.c")
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::NotFound);
        })
        .await;
    }

    #[tokio::test]
    async fn soft_deleted_tenant_is_rejected_by_require_active() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);

        scope(uber_ctx(), async {
            mgr.seed_templates().await.unwrap();
            let registered = mgr
                .register_tenant("acme", "custom", None, SubscriptionTier::Free, "a@b.c")
                .await
                .unwrap();
            let tenant_id = registered.tenant.tenant_id;

            mgr.soft_delete(tenant_id).await.unwrap();
            let err = mgr.require_active_tenant(tenant_id).await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::NotFound);
        })
        .await;
    }

    #[tokio::test]
    async fn tier_update_rewrites_rate_limits() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);

        scope(uber_ctx(), async {
            mgr.seed_templates().await.unwrap();
            let registered = mgr
                .register_tenant("acme", "custom", None, SubscriptionTier::Free, "a@b.c")
                .await
                .unwrap();
            let tenant_id = registered.tenant.tenant_id;

            mgr.update_tier(tenant_id, SubscriptionTier::Enterprise)
                .await
                .unwrap();
            let config = mgr.repos.tenants.get_config(tenant_id).await.unwrap().unwrap();
            assert_eq!(
                config.rate_limit.requests_per_minute,
                SubscriptionTier::Enterprise.requests_per_minute()
            );
        })
        .await;
    }
}

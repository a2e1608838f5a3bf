//! Platform assembly: wire the embedded backends, search services, tenant
//! manager, tool handlers, and pipeline into a dispatcher.

use crate::auth::Authenticator;
use crate::dispatcher::{Dispatcher, ToolRegistry};
use crate::middleware::audit::AuditPipeline;
use crate::middleware::observability::LogTraceSink;
use crate::middleware::Pipeline;
use ragserve_config::RagserveConfig;
use ragserve_core::model::api_key::TenantApiKey;
use ragserve_core::model::tenant::{SubscriptionTier, Tenant, TenantConfiguration};
use ragserve_core::model::user::{Role, User};
use ragserve_core::traits::relational::{ApiKeyStore, TenantStore, UserStore};
use ragserve_core::traits::sinks::TraceSink;
use ragserve_core::traits::vector::DistanceMetric;
use ragserve_core::Result;
use ragserve_search::{
    HybridConfig, HybridSearchService, KeywordSearchService, LocalHashEmbedder,
    VectorSearchService,
};
use ragserve_storage::{FlatVectorIndex, FsObjectStore, MemoryCache, MemoryKeywordIndex, MemoryRelational};
use ragserve_tenancy::TenantManager;
use ragserve_tools::{all_handlers, ToolContext};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Assembly knobs beyond the file configuration
pub struct PlatformOptions {
    pub config: RagserveConfig,
    /// Trace sink override, defaulting to the structured-log sink
    pub trace_sink: Option<Arc<dyn TraceSink>>,
}

impl PlatformOptions {
    #[must_use]
    pub fn new(config: RagserveConfig) -> Self {
        Self {
            config,
            trace_sink: None,
        }
    }
}

/// A fully wired server instance
pub struct Platform {
    pub dispatcher: Arc<Dispatcher>,
    pub tools: ToolContext,
    pub config: RagserveConfig,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

impl Platform {
    /// Build the platform over the embedded backends.
    pub fn build(options: PlatformOptions) -> Result<Self> {
        let config = options.config;
        let relational = MemoryRelational::new();
        let repos = relational.repositories();

        let vector = Arc::new(FlatVectorIndex::open(
            &config.backends.vector_index_root,
            &config.backends.vector_index_fallback_root,
            DistanceMetric::L2,
        )?);
        let objects = Arc::new(FsObjectStore::open(&config.backends.object_store_root)?);
        let keyword = Arc::new(MemoryKeywordIndex::new());
        let cache = Arc::new(MemoryCache::new());

        let embedder = Arc::new(LocalHashEmbedder::new(repos.tenants.clone(), 384));
        let vector_search = Arc::new(VectorSearchService::new(
            embedder.clone(),
            vector.clone(),
            repos.documents.clone(),
        ));
        let keyword_search = Arc::new(KeywordSearchService::new(
            keyword.clone(),
            repos.documents.clone(),
        ));
        let hybrid = Arc::new(HybridSearchService::new(
            vector_search,
            keyword_search,
            HybridConfig {
                arm_timeout: Duration::from_millis(config.search.arm_timeout_ms),
                vector_weight: config.search.vector_weight,
                keyword_weight: config.search.keyword_weight,
            },
        ));

        let tenants = Arc::new(TenantManager::new(
            repos.clone(),
            vector.clone(),
            objects.clone(),
            keyword.clone(),
        ));

        let tools = ToolContext {
            repos: repos.clone(),
            vector,
            objects,
            keyword,
            cache: cache.clone(),
            embedder,
            hybrid,
            tenants,
            backup_root: config.backends.backup_root.clone(),
        };

        let mut registry = ToolRegistry::new();
        for handler in all_handlers(&tools) {
            registry.register(handler);
        }

        let authenticator = Authenticator::new(
            repos.api_keys.clone(),
            repos.users.clone(),
            config.auth.jwt_secret.clone(),
            config.auth.jwt_issuer.clone(),
        );
        let audit = AuditPipeline::new(repos.audit.clone(), config.limits.audit_queue_capacity);
        let trace = options
            .trace_sink
            .unwrap_or_else(|| Arc::new(LogTraceSink));
        let pipeline = Pipeline::new(
            authenticator,
            repos.tenants.clone(),
            cache,
            audit,
            trace,
            config.limits.rate_limiting_enabled,
        );

        let dispatcher = Arc::new(Dispatcher::new(registry, pipeline));
        info!(
            tools = dispatcher.registry().len(),
            "platform assembled"
        );
        Ok(Self {
            dispatcher,
            tools,
            config,
        })
    }

    /// Seed the built-in templates. Idempotent, run at startup.
    pub async fn seed(&self) -> Result<()> {
        self.tools.tenants.seed_templates().await
    }

    /// First-run bootstrap: a platform tenant, an `uber_admin` principal, and
    /// its API key. Returns the key plaintext exactly once; subsequent calls
    /// with keys already present return `None`.
    pub async fn bootstrap_admin(&self, email: &str) -> Result<Option<String>> {
        if !self.tools.repos.api_keys.all_keys().await?.is_empty() {
            return Ok(None);
        }

        let tenant = Tenant::new("platform", SubscriptionTier::Enterprise);
        let tenant_id = tenant.tenant_id;
        self.tools.repos.tenants.insert_tenant(tenant).await?;
        self.tools
            .repos
            .tenants
            .insert_config(TenantConfiguration::new(tenant_id))
            .await?;

        let admin = User::new(tenant_id, email, Role::UberAdmin);
        self.tools.repos.users.insert_user(admin.clone()).await?;

        let plaintext = format!("rsk-{}", hex_random(24));
        let salt = hex_random(8);
        let key = TenantApiKey::new(tenant_id, admin.user_id, "bootstrap", salt, &plaintext);
        self.tools.repos.api_keys.insert_key(key).await?;

        info!(tenant_id = %tenant_id, email, "bootstrapped platform admin");
        Ok(Some(plaintext))
    }
}

fn hex_random(bytes: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

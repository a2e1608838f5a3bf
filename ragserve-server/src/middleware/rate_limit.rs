//! Rate limiting: fixed-window counter per `(tenant, minute)` in the shared
//! cache store, budget from the tenant's rate-limit configuration.

use ragserve_core::traits::cache::CacheStore;
use ragserve_core::traits::relational::TenantStore;
use ragserve_core::{RagError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

const WINDOW: Duration = Duration::from_secs(60);

/// Enforce the tenant's requests-per-minute budget. A tenant with rate
/// limiting disabled in its configuration passes through.
pub async fn check_rate_limit(
    cache: &Arc<dyn CacheStore>,
    tenants: &Arc<dyn TenantStore>,
    tenant_id: Uuid,
) -> Result<()> {
    let Some(config) = tenants.get_config(tenant_id).await? else {
        return Ok(());
    };
    if !config.rate_limit.enabled {
        return Ok(());
    }

    let minute = chrono::Utc::now().timestamp() / 60;
    let key = format!("rl:{tenant_id}:{minute}");
    let count = cache.incr_window(&key, WINDOW).await?;
    let budget = u64::from(config.rate_limit.requests_per_minute);
    if count > budget {
        warn!(
            tenant_id = %tenant_id,
            count,
            budget,
            "rate limit exceeded"
        );
        return Err(RagError::rate_limited(
            format!("rate limit of {budget} requests per minute exceeded"),
            Some(60),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::model::tenant::{Tenant, TenantConfiguration};
    use ragserve_core::SubscriptionTier;
    use ragserve_storage::{MemoryCache, MemoryRelational};

    #[tokio::test]
    async fn requests_beyond_budget_are_rejected() {
        let relational = MemoryRelational::new();
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let tenants: Arc<dyn TenantStore> = relational.clone();

        let tenant = Tenant::new("acme", SubscriptionTier::Free);
        let tenant_id = tenant.tenant_id;
        let mut config = TenantConfiguration::new(tenant_id);
        config.rate_limit.requests_per_minute = 3;
        tenants.insert_tenant(tenant).await.unwrap();
        tenants.insert_config(config).await.unwrap();

        for _ in 0..3 {
            check_rate_limit(&cache, &tenants, tenant_id).await.unwrap();
        }
        let err = check_rate_limit(&cache, &tenants, tenant_id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn disabled_rate_limiting_passes_through() {
        let relational = MemoryRelational::new();
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let tenants: Arc<dyn TenantStore> = relational.clone();

        let tenant = Tenant::new("acme", SubscriptionTier::Free);
        let tenant_id = tenant.tenant_id;
        let mut config = TenantConfiguration::new(tenant_id);
        config.rate_limit.enabled = false;
        config.rate_limit.requests_per_minute = 1;
        tenants.insert_tenant(tenant).await.unwrap();
        tenants.insert_config(config).await.unwrap();

        for _ in 0..10 {
            check_rate_limit(&cache, &tenants, tenant_id).await.unwrap();
        }
    }
}

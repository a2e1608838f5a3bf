//! Monitoring and analytics tools.
//!
//! Aggregates come from the audit log plus backend counters. Analytics
//! results are cached for five minutes under `(tenant, filters)`-derived
//! keys; health results for thirty seconds.

use crate::{parse_args, ToolContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragserve_core::context;
use ragserve_core::model::audit::{AuditQuery, AuditRecord};
use ragserve_core::traits::cache::CacheStore;
use ragserve_core::traits::keyword::KeywordIndex;
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::{AuditStore, DocumentStore, TenantStore};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const ANALYTICS_TTL: Duration = Duration::from_secs(300);
const HEALTH_TTL: Duration = Duration::from_secs(30);
const SAMPLE_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct AnalyticsArgs {
    tenant_id: Option<Uuid>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    /// Optional subset of metric names to include
    #[serde(default)]
    metrics: Vec<String>,
}

impl AnalyticsArgs {
    fn cache_suffix(&self) -> String {
        format!(
            "{}:{}:{}",
            self.start_date.map(|d| d.timestamp()).unwrap_or_default(),
            self.end_date.map(|d| d.timestamp()).unwrap_or_default(),
            self.metrics.join(",")
        )
    }

    fn wants(&self, metric: &str) -> bool {
        self.metrics.is_empty() || self.metrics.iter().any(|m| m == metric)
    }
}

/// Recent post-execution samples for an action prefix
async fn audit_samples(
    ctx: &ToolContext,
    tenant_id: Uuid,
    action_prefix: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<Vec<AuditRecord>> {
    let query = AuditQuery {
        tenant_id: Some(tenant_id),
        action_prefix: Some(action_prefix.to_string()),
        from,
        to,
        limit: SAMPLE_LIMIT,
        ..AuditQuery::default()
    };
    let (records, _) = ctx.repos.audit.query(&query).await?;
    Ok(records
        .into_iter()
        .filter(|r| r.details.get("phase").and_then(Value::as_str) == Some("post_execution"))
        .collect())
}

fn durations_ms(records: &[AuditRecord]) -> Vec<u64> {
    let mut durations: Vec<u64> = records
        .iter()
        .filter_map(|r| r.details.get("duration_ms").and_then(Value::as_u64))
        .collect();
    durations.sort_unstable();
    durations
}

fn percentile(sorted: &[u64], pct: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = ((pct / 100.0) * (sorted.len() as f64 - 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[allow(clippy::cast_precision_loss)]
fn error_rate(records: &[AuditRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let failed = records.iter().filter(|r| !r.success()).count();
    failed as f64 / records.len() as f64
}

/// `rag_get_usage_stats`
pub struct GetUsageStats {
    ctx: ToolContext,
}

impl GetUsageStats {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetUsageStats {
    fn name(&self) -> &'static str {
        "rag_get_usage_stats"
    }

    fn description(&self) -> &'static str {
        "Tenant usage statistics"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: AnalyticsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let cache_key = format!("usage_stats:{tenant_id}:{}", args.cache_suffix());
        if let Some(cached) = self.ctx.cache.get(&cache_key).await? {
            debug!(tenant_id = %tenant_id, "usage stats served from cache");
            return Ok(cached);
        }

        let usage = self.ctx.tenants.usage(tenant_id).await;
        let document_count = self.ctx.repos.documents.count_documents(tenant_id).await?;
        let samples = audit_samples(&self.ctx, tenant_id, "rag_", args.start_date, args.end_date)
            .await?;

        let mut stats = serde_json::Map::new();
        if args.wants("documents") {
            stats.insert("document_count".to_string(), json!(document_count));
            stats.insert(
                "documents_indexed".to_string(),
                json!(usage.documents_indexed),
            );
            stats.insert("storage_bytes".to_string(), json!(usage.storage_bytes));
        }
        if args.wants("searches") {
            stats.insert(
                "searches_performed".to_string(),
                json!(usage.searches_performed),
            );
        }
        if args.wants("embeddings") {
            stats.insert(
                "embeddings_generated".to_string(),
                json!(usage.embeddings_generated),
            );
        }
        if args.wants("requests") {
            stats.insert("recent_tool_calls".to_string(), json!(samples.len()));
            stats.insert("error_rate".to_string(), json!(error_rate(&samples)));
        }

        let result = json!({ "tenant_id": tenant_id, "stats": Value::Object(stats) });
        self.ctx
            .cache
            .put(&cache_key, result.clone(), ANALYTICS_TTL)
            .await?;
        Ok(result)
    }
}

/// `rag_get_search_analytics`
pub struct GetSearchAnalytics {
    ctx: ToolContext,
}

impl GetSearchAnalytics {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetSearchAnalytics {
    fn name(&self) -> &'static str {
        "rag_get_search_analytics"
    }

    fn description(&self) -> &'static str {
        "Search analytics from audit samples"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: AnalyticsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let cache_key = format!("search_analytics:{tenant_id}:{}", args.cache_suffix());
        if let Some(cached) = self.ctx.cache.get(&cache_key).await? {
            return Ok(cached);
        }

        let mut samples = audit_samples(
            &self.ctx,
            tenant_id,
            "rag_search",
            args.start_date,
            args.end_date,
        )
        .await?;
        samples.retain(|r| r.action == "rag_search");

        let durations = durations_ms(&samples);
        let successful = samples.iter().filter(|r| r.success()).count();
        let result = json!({
            "tenant_id": tenant_id,
            "total_searches": samples.len(),
            "successful_searches": successful,
            "failed_searches": samples.len() - successful,
            "p50_ms": percentile(&durations, 50.0),
            "p95_ms": percentile(&durations, 95.0),
            "p99_ms": percentile(&durations, 99.0),
        });
        self.ctx
            .cache
            .put(&cache_key, result.clone(), ANALYTICS_TTL)
            .await?;
        Ok(result)
    }
}

/// `rag_get_memory_analytics`
pub struct GetMemoryAnalytics {
    ctx: ToolContext,
}

impl GetMemoryAnalytics {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetMemoryAnalytics {
    fn name(&self) -> &'static str {
        "rag_get_memory_analytics"
    }

    fn description(&self) -> &'static str {
        "Memory-tool analytics from audit samples"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: AnalyticsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let cache_key = format!("memory_analytics:{tenant_id}:{}", args.cache_suffix());
        if let Some(cached) = self.ctx.cache.get(&cache_key).await? {
            return Ok(cached);
        }

        let samples = audit_samples(
            &self.ctx,
            tenant_id,
            "mem0_",
            args.start_date,
            args.end_date,
        )
        .await?;
        let count_for = |action: &str| samples.iter().filter(|r| r.action == action).count();
        let result = json!({
            "tenant_id": tenant_id,
            "total_memory_operations": samples.len(),
            "reads": count_for("mem0_get_user_memory"),
            "writes": count_for("mem0_update_memory"),
            "searches": count_for("mem0_search_memory"),
            "error_rate": error_rate(&samples),
        });
        self.ctx
            .cache
            .put(&cache_key, result.clone(), ANALYTICS_TTL)
            .await?;
        Ok(result)
    }
}

/// Probe the four backends for one tenant, timing each
async fn probe_tenant_backends(ctx: &ToolContext, tenant_id: Uuid) -> (Vec<Value>, bool) {
    let mut components = Vec::new();
    let mut all_healthy = true;

    let started = Instant::now();
    match ctx.repos.documents.count_documents(tenant_id).await {
        Ok(count) => components.push(json!({
            "component": "postgresql",
            "status": "healthy",
            "latency_ms": started.elapsed().as_millis() as u64,
            "document_count": count,
        })),
        Err(err) => {
            all_healthy = false;
            components.push(json!({
                "component": "postgresql", "status": "unhealthy", "error": err.to_string(),
            }));
        }
    }

    let started = Instant::now();
    match ctx.vector.ntotal(tenant_id).await {
        Ok(count) => components.push(json!({
            "component": "faiss",
            "status": "healthy",
            "latency_ms": started.elapsed().as_millis() as u64,
            "vector_count": count,
        })),
        Err(err) => {
            all_healthy = false;
            components.push(json!({
                "component": "faiss", "status": "unhealthy", "error": err.to_string(),
            }));
        }
    }

    let started = Instant::now();
    match ctx.objects.list(tenant_id, "documents/").await {
        Ok(keys) => components.push(json!({
            "component": "minio",
            "status": "healthy",
            "latency_ms": started.elapsed().as_millis() as u64,
            "object_count": keys.len(),
        })),
        Err(err) => {
            all_healthy = false;
            components.push(json!({
                "component": "minio", "status": "unhealthy", "error": err.to_string(),
            }));
        }
    }

    let started = Instant::now();
    match ctx.keyword.document_count(tenant_id).await {
        Ok(count) => components.push(json!({
            "component": "meilisearch",
            "status": "healthy",
            "latency_ms": started.elapsed().as_millis() as u64,
            "document_count": count,
        })),
        Err(err) => {
            all_healthy = false;
            components.push(json!({
                "component": "meilisearch", "status": "unhealthy", "error": err.to_string(),
            }));
        }
    }

    (components, all_healthy)
}

fn overall_status(all_healthy: bool, error_rate: f64) -> (&'static str, Vec<String>) {
    let mut recommendations = Vec::new();
    let status = if !all_healthy {
        recommendations.push("one or more backends are failing; check component errors".to_string());
        "unhealthy"
    } else if error_rate > 0.25 {
        recommendations.push(format!(
            "error rate {:.0}% is critical; inspect recent audit failures",
            error_rate * 100.0
        ));
        "unhealthy"
    } else if error_rate > 0.05 {
        recommendations.push(format!(
            "error rate {:.0}% is elevated; inspect recent audit failures",
            error_rate * 100.0
        ));
        "degraded"
    } else {
        "healthy"
    };
    (status, recommendations)
}

/// `rag_get_tenant_health`
pub struct GetTenantHealth {
    ctx: ToolContext,
}

impl GetTenantHealth {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetTenantHealth {
    fn name(&self) -> &'static str {
        "rag_get_tenant_health"
    }

    fn description(&self) -> &'static str {
        "Backend health for one tenant"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: AnalyticsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let cache_key = format!("tenant_health:{tenant_id}");
        if let Some(cached) = self.ctx.cache.get(&cache_key).await? {
            return Ok(cached);
        }

        let (components, all_healthy) = probe_tenant_backends(&self.ctx, tenant_id).await;
        let samples = audit_samples(&self.ctx, tenant_id, "rag_", None, None).await?;
        let durations = durations_ms(&samples);
        let rate = error_rate(&samples);
        let (status, recommendations) = overall_status(all_healthy, rate);

        let result = json!({
            "tenant_id": tenant_id,
            "status": status,
            "summary": format!(
                "{} of 4 components healthy, error rate {:.1}%",
                components.iter().filter(|c| c["status"] == "healthy").count(),
                rate * 100.0
            ),
            "components": components,
            "latency": {
                "p50_ms": percentile(&durations, 50.0),
                "p95_ms": percentile(&durations, 95.0),
                "p99_ms": percentile(&durations, 99.0),
            },
            "error_rate": rate,
            "recommendations": recommendations,
        });
        self.ctx
            .cache
            .put(&cache_key, result.clone(), HEALTH_TTL)
            .await?;
        Ok(result)
    }
}

/// `rag_get_system_health` (uber-admin)
pub struct GetSystemHealth {
    ctx: ToolContext,
}

impl GetSystemHealth {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetSystemHealth {
    fn name(&self) -> &'static str {
        "rag_get_system_health"
    }

    fn description(&self) -> &'static str {
        "Platform-wide backend health"
    }

    async fn handle(&self, _args: Value) -> Result<Value> {
        let cache_key = "system_health".to_string();
        if let Some(cached) = self.ctx.cache.get(&cache_key).await? {
            return Ok(cached);
        }

        let tenants = self.ctx.repos.tenants.list_tenants().await?;
        let active = tenants.iter().filter(|t| !t.is_deleted()).count();

        let mut unhealthy_tenants = Vec::new();
        for tenant in tenants.iter().filter(|t| !t.is_deleted()) {
            let (_, healthy) = probe_tenant_backends(&self.ctx, tenant.tenant_id).await;
            if !healthy {
                unhealthy_tenants.push(tenant.tenant_id);
            }
        }

        let status = if unhealthy_tenants.is_empty() {
            "healthy"
        } else if unhealthy_tenants.len() * 4 < active {
            "degraded"
        } else {
            "unhealthy"
        };
        let result = json!({
            "status": status,
            "summary": format!(
                "{active} active tenants, {} with failing backends",
                unhealthy_tenants.len()
            ),
            "tenant_count": tenants.len(),
            "active_tenant_count": active,
            "unhealthy_tenants": unhealthy_tenants,
        });
        self.ctx
            .cache
            .put(&cache_key, result.clone(), HEALTH_TTL)
            .await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_handles_small_samples() {
        assert_eq!(percentile(&[], 95.0), 0);
        assert_eq!(percentile(&[10], 50.0), 10);
        let sorted = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        assert_eq!(percentile(&sorted, 50.0), 5);
        assert_eq!(percentile(&sorted, 99.0), 10);
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(overall_status(true, 0.0).0, "healthy");
        assert_eq!(overall_status(true, 0.1).0, "degraded");
        assert_eq!(overall_status(true, 0.5).0, "unhealthy");
        assert_eq!(overall_status(false, 0.0).0, "unhealthy");
    }
}

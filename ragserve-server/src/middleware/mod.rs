//! Middleware pipeline around tool execution.
//!
//! Fixed stage order: authentication → tenant extraction → rate limiting →
//! authorization → audit wrap → observability wrap → handler. Later stages
//! depend on earlier stages' side effects, so the order is load-bearing. A
//! failing stage short-circuits; the audit and observability post-records
//! fire on every control-flow exit once their stages have been entered.

pub mod audit;
pub mod observability;
pub mod rate_limit;

use crate::auth::{Authenticator, Principal};
use audit::{redact_arguments, truncate_result, AuditPipeline};
use chrono::Utc;
use ragserve_core::context::{self, RequestContext};
use ragserve_core::model::audit::AuditRecord;
use ragserve_core::model::user::Role;
use ragserve_core::permissions;
use ragserve_core::traits::cache::CacheStore;
use ragserve_core::traits::relational::TenantStore;
use ragserve_core::traits::sinks::{ToolTrace, TraceSink};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::{RagError, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Transport credentials and request metadata entering the pipeline
#[derive(Debug, Clone, Default)]
pub struct AuthMaterial {
    /// `X-API-Key`
    pub api_key: Option<String>,
    /// `Authorization: Bearer …`
    pub bearer_token: Option<String>,
    /// `X-Tenant-ID`, honored only for `uber_admin`
    pub tenant_header: Option<Uuid>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
}

/// The ordered middleware chain
pub struct Pipeline {
    authenticator: Authenticator,
    tenants: Arc<dyn TenantStore>,
    cache: Arc<dyn CacheStore>,
    audit: AuditPipeline,
    trace: Arc<dyn TraceSink>,
    rate_limiting_enabled: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("rate_limiting_enabled", &self.rate_limiting_enabled)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(
        authenticator: Authenticator,
        tenants: Arc<dyn TenantStore>,
        cache: Arc<dyn CacheStore>,
        audit: AuditPipeline,
        trace: Arc<dyn TraceSink>,
        rate_limiting_enabled: bool,
    ) -> Self {
        Self {
            authenticator,
            tenants,
            cache,
            audit,
            trace,
            rate_limiting_enabled,
        }
    }

    /// Run the full chain around `handler`.
    pub async fn execute(
        &self,
        handler: &Arc<dyn ToolHandler>,
        args: Value,
        material: AuthMaterial,
    ) -> Result<Value> {
        let tool = handler.name();

        // Stage 1: authentication
        let principal = self
            .authenticator
            .authenticate(material.api_key.as_deref(), material.bearer_token.as_deref())
            .await?;

        // Stage 2: tenant extraction
        let tenant_id = self.extract_tenant(&principal, material.tenant_header).await?;

        // Stage 3: rate limiting (config-gated)
        if self.rate_limiting_enabled {
            if let Some(tenant_id) = tenant_id {
                rate_limit::check_rate_limit(&self.cache, &self.tenants, tenant_id).await?;
            }
        }

        // Stage 4: authorization
        if !permissions::is_allowed(tool, principal.role) {
            warn!(
                tool,
                role = %principal.role,
                "authorization denied"
            );
            return Err(RagError::authorization(format!(
                "role {} may not invoke {tool}",
                principal.role
            )));
        }

        let mut ctx = RequestContext::new()
            .with_user(principal.user_id)
            .with_role(principal.role)
            .with_auth_method(principal.auth_method);
        if let Some(tenant_id) = tenant_id {
            ctx = ctx.with_tenant(tenant_id);
        }
        if let Some(session) = &material.session_id {
            ctx = ctx.with_session(session.clone());
        }
        if let Some(ip) = &material.ip_address {
            ctx = ctx.with_ip(ip.clone());
        }

        // Stage 5: audit wrap, optimistic pre-execution record
        self.audit.emit(
            self.base_record(tool, tenant_id, &principal).with_details(json!({
                "phase": "pre_execution",
                "success": true,
                "arguments": redact_arguments(&args),
                "role": principal.role.as_str(),
                "auth_method": principal.auth_method.as_str(),
                "ip_address": material.ip_address.clone(),
                "session_id": material.session_id.clone(),
            })),
        );

        // Stage 6: observability wrap + handler. Post-records are emitted on
        // both branches so every control-flow exit is covered.
        debug!(tool, tenant_id = ?tenant_id, "invoking handler");
        let started = Instant::now();
        let result = context::scope(ctx, handler.handle(args)).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match &result {
            Ok(value) => {
                self.audit.emit(
                    self.base_record(tool, tenant_id, &principal).with_details(json!({
                        "phase": "post_execution",
                        "success": true,
                        "duration_ms": duration_ms,
                        "role": principal.role.as_str(),
                        "auth_method": principal.auth_method.as_str(),
                        "ip_address": material.ip_address.clone(),
                        "session_id": material.session_id.clone(),
                        "result_summary": truncate_result(value),
                    })),
                );
                self.emit_trace(tool, tenant_id, &principal, duration_ms, true, None);
            }
            Err(err) => {
                self.audit.emit(
                    self.base_record(tool, tenant_id, &principal).with_details(json!({
                        "phase": "post_execution",
                        "success": false,
                        "duration_ms": duration_ms,
                        "role": principal.role.as_str(),
                        "auth_method": principal.auth_method.as_str(),
                        "ip_address": material.ip_address.clone(),
                        "session_id": material.session_id.clone(),
                        "error": err.to_string(),
                    })),
                );
                self.emit_trace(
                    tool,
                    tenant_id,
                    &principal,
                    duration_ms,
                    false,
                    Some(err.to_string()),
                );
            }
        }
        result
    }

    /// Tenant from the authenticated principal, or from the explicit header
    /// for `uber_admin` cross-tenant calls. The resolved tenant must exist
    /// and not be soft-deleted. Only `uber_admin` may proceed tenantless.
    async fn extract_tenant(
        &self,
        principal: &Principal,
        tenant_header: Option<Uuid>,
    ) -> Result<Option<Uuid>> {
        let resolved = if principal.role == Role::UberAdmin && tenant_header.is_some() {
            tenant_header
        } else {
            principal.tenant_id
        };

        match resolved {
            Some(tenant_id) => {
                let tenant = self
                    .tenants
                    .get_tenant(tenant_id)
                    .await?
                    .ok_or_else(|| {
                        RagError::tenant_isolation(format!("tenant {tenant_id} does not exist"))
                    })?;
                if tenant.is_deleted() {
                    return Err(RagError::tenant_isolation(format!(
                        "tenant {tenant_id} is deleted"
                    )));
                }
                Ok(Some(tenant_id))
            }
            None if principal.role == Role::UberAdmin => Ok(None),
            None => Err(RagError::tenant_isolation(
                "no tenant resolved for principal",
            )),
        }
    }

    fn base_record(
        &self,
        tool: &str,
        tenant_id: Option<Uuid>,
        principal: &Principal,
    ) -> AuditRecord {
        let mut record =
            AuditRecord::new(tool, resource_type_for(tool)).with_user(principal.user_id);
        if let Some(tenant_id) = tenant_id {
            record = record.with_tenant(tenant_id);
        }
        record
    }

    fn emit_trace(
        &self,
        tool: &str,
        tenant_id: Option<Uuid>,
        principal: &Principal,
        duration_ms: u64,
        success: bool,
        error: Option<String>,
    ) {
        let sink = Arc::clone(&self.trace);
        let trace = ToolTrace {
            name: tool.to_string(),
            tenant_id,
            user_id: Some(principal.user_id),
            role: Some(principal.role.as_str().to_string()),
            duration_ms,
            success,
            error,
            timestamp: Utc::now(),
        };
        // Sink failures never surface
        tokio::spawn(async move {
            if let Err(err) = sink.record(trace).await {
                warn!(error = %err, "trace sink failed");
            }
        });
    }
}

/// Resource class recorded in the audit log for a tool name
#[must_use]
pub fn resource_type_for(tool: &str) -> &'static str {
    if tool.starts_with("mem0_") {
        "memory"
    } else if tool.contains("search") {
        "search"
    } else if tool.contains("document") || tool == "rag_ingest" {
        "document"
    } else if tool.contains("backup") || tool.contains("restore") || tool.contains("rebuild") {
        "backup"
    } else if tool.contains("tenant") || tool.contains("subscription") {
        "tenant"
    } else if tool.contains("audit") {
        "audit"
    } else if tool.contains("health") || tool.contains("stats") || tool.contains("analytics") {
        "monitoring"
    } else {
        "tool"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_types_cover_the_tool_families() {
        assert_eq!(resource_type_for("rag_search"), "search");
        assert_eq!(resource_type_for("rag_ingest"), "document");
        assert_eq!(resource_type_for("mem0_update_memory"), "memory");
        assert_eq!(resource_type_for("rag_backup_tenant_data"), "backup");
        assert_eq!(resource_type_for("rag_register_tenant"), "tenant");
        assert_eq!(resource_type_for("rag_get_system_health"), "monitoring");
        assert_eq!(resource_type_for("rag_list_tools"), "tool");
    }
}

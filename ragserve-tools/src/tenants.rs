//! Tenant administration tools.

use crate::{backup, parse_args, ToolContext};
use async_trait::async_trait;
use ragserve_core::context;
use ragserve_core::model::tenant::SubscriptionTier;
use ragserve_core::traits::relational::TenantStore;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::{RagError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

const SOFT_DELETE_CONFIRMATION: &str = "SOFT_DELETE";
const HARD_DELETE_CONFIRMATION: &str = "DELETE";
const RECOVERY_WINDOW_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
struct RegisterTenantArgs {
    tenant_name: String,
    template_name: String,
    domain: Option<String>,
    #[serde(default = "default_tier")]
    tier: String,
    admin_email: Option<String>,
}

fn default_tier() -> String {
    "free".to_string()
}

/// `rag_register_tenant` (uber-admin)
pub struct RegisterTenant {
    ctx: ToolContext,
}

impl RegisterTenant {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for RegisterTenant {
    fn name(&self) -> &'static str {
        "rag_register_tenant"
    }

    fn description(&self) -> &'static str {
        "Register a tenant from a template"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: RegisterTenantArgs = parse_args(args)?;
        let tier: SubscriptionTier = args.tier.parse()?;
        let admin_email = args
            .admin_email
            .unwrap_or_else(|| format!("admin@{}.invalid", args.tenant_name));

        let registered = self
            .ctx
            .tenants
            .register_tenant(
                &args.tenant_name,
                &args.template_name,
                args.domain,
                tier,
                &admin_email,
            )
            .await?;

        // The key plaintext is returned exactly once, here
        Ok(json!({
            "tenant_id": registered.tenant.tenant_id,
            "name": registered.tenant.name,
            "tier": registered.tenant.tier.as_str(),
            "template": args.template_name,
            "admin_user_id": registered.admin_user.user_id,
            "admin_email": registered.admin_user.email,
            "api_key_id": registered.api_key_id,
            "api_key": registered.api_key,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct DeleteTenantArgs {
    tenant_id: Uuid,
    confirmation: Option<String>,
    #[serde(default = "default_delete_type")]
    delete_type: String,
}

fn default_delete_type() -> String {
    "soft".to_string()
}

/// `rag_delete_tenant` (uber-admin): soft delete tombstones with a recovery
/// window; hard delete creates a safety backup and then removes the tenant's
/// resources across all four backends. Audit records are retained either way.
pub struct DeleteTenant {
    ctx: ToolContext,
}

impl DeleteTenant {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for DeleteTenant {
    fn name(&self) -> &'static str {
        "rag_delete_tenant"
    }

    fn description(&self) -> &'static str {
        "Soft or hard delete a tenant"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: DeleteTenantArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(Some(args.tenant_id))?;

        match args.delete_type.as_str() {
            "soft" => {
                if args.confirmation.as_deref() != Some(SOFT_DELETE_CONFIRMATION) {
                    return Err(RagError::validation_field(
                        format!("soft delete requires confirmation {SOFT_DELETE_CONFIRMATION}"),
                        "confirmation",
                    ));
                }
                let tenant = self.ctx.tenants.soft_delete(tenant_id).await?;
                Ok(json!({
                    "tenant_id": tenant.tenant_id,
                    "status": "soft_deleted",
                    "recovery_window_days": RECOVERY_WINDOW_DAYS,
                    "deleted_at": tenant.deleted_at,
                }))
            }
            "hard" => {
                if args.confirmation.as_deref() != Some(HARD_DELETE_CONFIRMATION) {
                    return Err(RagError::validation_field(
                        format!("hard delete requires confirmation {HARD_DELETE_CONFIRMATION}"),
                        "confirmation",
                    ));
                }
                // Safety backup before any destructive work
                let safety = backup::run_backup(&self.ctx, tenant_id, "full", None).await?;
                let safety_backup_id =
                    safety["backup_id"].as_str().unwrap_or_default().to_string();

                self.ctx.tenants.hard_delete(tenant_id).await?;
                info!(tenant_id = %tenant_id, safety_backup_id, "tenant hard-deleted");
                Ok(json!({
                    "tenant_id": tenant_id,
                    "status": "hard_deleted",
                    "safety_backup_id": safety_backup_id,
                    "audit_logs_retained": true,
                }))
            }
            other => Err(RagError::validation_field(
                format!("delete_type must be soft or hard, got {other}"),
                "delete_type",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateTierArgs {
    tenant_id: Uuid,
    tier: String,
}

/// `rag_update_subscription_tier` (uber-admin). The tool surface accepts
/// free, basic, and enterprise; premium is assigned through sales tooling.
pub struct UpdateSubscriptionTier {
    ctx: ToolContext,
}

impl UpdateSubscriptionTier {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for UpdateSubscriptionTier {
    fn name(&self) -> &'static str {
        "rag_update_subscription_tier"
    }

    fn description(&self) -> &'static str {
        "Change a tenant's subscription tier"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: UpdateTierArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(Some(args.tenant_id))?;

        let tier: SubscriptionTier = args.tier.parse()?;
        if !matches!(
            tier,
            SubscriptionTier::Free | SubscriptionTier::Basic | SubscriptionTier::Enterprise
        ) {
            return Err(RagError::validation_field(
                "tier must be one of free, basic, enterprise",
                "tier",
            ));
        }

        let tenant = self.ctx.tenants.update_tier(tenant_id, tier).await?;
        Ok(json!({
            "tenant_id": tenant.tenant_id,
            "tier": tenant.tier.as_str(),
            "requests_per_minute": tier.requests_per_minute(),
            "max_documents": tier.max_documents(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct GetTierArgs {
    tenant_id: Option<Uuid>,
}

/// `rag_get_subscription_tier`
pub struct GetSubscriptionTier {
    ctx: ToolContext,
}

impl GetSubscriptionTier {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetSubscriptionTier {
    fn name(&self) -> &'static str {
        "rag_get_subscription_tier"
    }

    fn description(&self) -> &'static str {
        "Read a tenant's subscription tier"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: GetTierArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let tenant = self.ctx.tenants.require_active_tenant(tenant_id).await?;
        Ok(json!({
            "tenant_id": tenant.tenant_id,
            "tier": tenant.tier.as_str(),
            "requests_per_minute": tenant.tier.requests_per_minute(),
            "max_documents": tenant.tier.max_documents(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ConfigureModelsArgs {
    tenant_id: Option<Uuid>,
    embedding_model: Option<String>,
    embedding_dimension: Option<usize>,
    llm_model: Option<String>,
}

/// `rag_configure_tenant_models`
pub struct ConfigureTenantModels {
    ctx: ToolContext,
}

impl ConfigureTenantModels {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for ConfigureTenantModels {
    fn name(&self) -> &'static str {
        "rag_configure_tenant_models"
    }

    fn description(&self) -> &'static str {
        "Set the tenant's model configuration"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: ConfigureModelsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;

        let mut config = self
            .ctx
            .repos
            .tenants
            .get_config(tenant_id)
            .await?
            .ok_or_else(|| {
                RagError::not_found(format!("configuration for tenant {tenant_id} not found"))
            })?;

        if let Some(model) = args.embedding_model {
            config.embedding_model = model;
        }
        if let Some(dimension) = args.embedding_dimension {
            if dimension == 0 || dimension > 4096 {
                return Err(RagError::validation_field(
                    "embedding_dimension must be between 1 and 4096",
                    "embedding_dimension",
                ));
            }
            config.embedding_dimension = dimension;
        }
        if let Some(model) = args.llm_model {
            config.llm_model = model;
        }
        config.updated_at = chrono::Utc::now();
        self.ctx.repos.tenants.update_config(config.clone()).await?;

        Ok(json!({
            "tenant_id": tenant_id,
            "embedding_model": config.embedding_model,
            "embedding_dimension": config.embedding_dimension,
            "llm_model": config.llm_model,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct UpdateConfigArgs {
    tenant_id: Option<Uuid>,
    custom: Option<HashMap<String, Value>>,
    audit_logging_enabled: Option<bool>,
    rate_limit_enabled: Option<bool>,
    requests_per_minute: Option<u32>,
}

/// `rag_update_tenant_config`
pub struct UpdateTenantConfig {
    ctx: ToolContext,
}

impl UpdateTenantConfig {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for UpdateTenantConfig {
    fn name(&self) -> &'static str {
        "rag_update_tenant_config"
    }

    fn description(&self) -> &'static str {
        "Update tenant configuration values"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: UpdateConfigArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;

        let mut config = self
            .ctx
            .repos
            .tenants
            .get_config(tenant_id)
            .await?
            .ok_or_else(|| {
                RagError::not_found(format!("configuration for tenant {tenant_id} not found"))
            })?;

        if let Some(custom) = args.custom {
            config.custom.extend(custom);
        }
        if let Some(enabled) = args.audit_logging_enabled {
            config.audit_logging_enabled = enabled;
        }
        if let Some(enabled) = args.rate_limit_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(rpm) = args.requests_per_minute {
            if rpm == 0 {
                return Err(RagError::validation_field(
                    "requests_per_minute must be positive",
                    "requests_per_minute",
                ));
            }
            config.rate_limit.requests_per_minute = rpm;
        }
        config.updated_at = chrono::Utc::now();
        self.ctx.repos.tenants.update_config(config.clone()).await?;

        Ok(json!({
            "tenant_id": tenant_id,
            "audit_logging_enabled": config.audit_logging_enabled,
            "rate_limit": {
                "enabled": config.rate_limit.enabled,
                "requests_per_minute": config.rate_limit.requests_per_minute,
            },
            "custom_keys": config.custom.keys().cloned().collect::<Vec<String>>(),
        }))
    }
}

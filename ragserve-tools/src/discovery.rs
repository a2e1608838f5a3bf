//! Tool discovery

use async_trait::async_trait;
use ragserve_core::context;
use ragserve_core::permissions;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::Result;
use serde_json::{json, Value};

/// Static catalog descriptions, one per permission-matrix row
const DESCRIPTIONS: &[(&str, &str)] = &[
    ("rag_list_tools", "List the tools available to the caller"),
    ("rag_list_templates", "List tenant provisioning templates"),
    ("rag_get_template", "Fetch one provisioning template by name"),
    ("rag_search", "Hybrid search over the tenant knowledge base"),
    ("rag_get_document", "Fetch one document with its content"),
    ("rag_list_documents", "Paginated document listing with filters"),
    ("rag_ingest", "Ingest a document into all backends"),
    ("rag_delete_document", "Soft-delete a document"),
    ("mem0_get_user_memory", "Read user-scoped memory entries"),
    ("mem0_update_memory", "Write or clear a user memory entry"),
    ("mem0_search_memory", "Search user-scoped memory"),
    ("rag_query_audit_logs", "Query the tenant audit log"),
    ("rag_get_usage_stats", "Tenant usage statistics"),
    ("rag_get_search_analytics", "Search analytics from audit samples"),
    ("rag_get_memory_analytics", "Memory-tool analytics from audit samples"),
    ("rag_get_tenant_health", "Backend health for one tenant"),
    ("rag_get_system_health", "Platform-wide backend health"),
    ("rag_backup_tenant_data", "Back up all four tenant backends"),
    ("rag_restore_tenant_data", "Restore a tenant from a backup set"),
    ("rag_validate_backup", "Validate a backup set's integrity"),
    ("rag_rebuild_index", "Rebuild the tenant vector index"),
    ("rag_register_tenant", "Register a tenant from a template"),
    ("rag_delete_tenant", "Soft or hard delete a tenant"),
    ("rag_update_subscription_tier", "Change a tenant's subscription tier"),
    ("rag_get_subscription_tier", "Read a tenant's subscription tier"),
    ("rag_configure_tenant_models", "Set the tenant's model configuration"),
    ("rag_update_tenant_config", "Update tenant configuration values"),
];

fn describe(tool: &str) -> &'static str {
    DESCRIPTIONS
        .iter()
        .find(|(name, _)| *name == tool)
        .map_or("", |(_, description)| description)
}

/// `rag_list_tools`: the registered tools with the caller's access flag
pub struct ListTools;

#[async_trait]
impl ToolHandler for ListTools {
    fn name(&self) -> &'static str {
        "rag_list_tools"
    }

    fn description(&self) -> &'static str {
        "List the tools available to the caller"
    }

    async fn handle(&self, _args: Value) -> Result<Value> {
        let role = context::require_role()?;
        let tools: Vec<Value> = permissions::all_tools()
            .into_iter()
            .map(|tool| {
                json!({
                    "name": tool,
                    "description": describe(tool),
                    "allowed": permissions::is_allowed(tool, role),
                })
            })
            .collect();
        Ok(json!({ "tools": tools, "role": role.as_str() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::permissions::all_tools;

    #[test]
    fn every_matrix_tool_has_a_description() {
        for tool in all_tools() {
            assert!(!describe(tool).is_empty(), "missing description for {tool}");
        }
    }
}

//! ABOUTME: Static role-based permission matrix for tool invocations
//! ABOUTME: Data table consulted by the authorization middleware stage

use crate::model::user::Role;
use std::collections::HashMap;
use std::sync::LazyLock;

const ALL: &[Role] = &[
    Role::UberAdmin,
    Role::TenantAdmin,
    Role::ProjectAdmin,
    Role::EndUser,
];

const WRITERS: &[Role] = &[Role::UberAdmin, Role::TenantAdmin, Role::ProjectAdmin];

const ADMINS: &[Role] = &[Role::UberAdmin, Role::TenantAdmin];

const UBER_ONLY: &[Role] = &[Role::UberAdmin];

/// Tool name → roles allowed to invoke it.
///
/// Every registered tool has a row here; a tool without a row is denied for
/// all roles, which keeps a registration mistake failing closed.
static TOOL_PERMISSIONS: LazyLock<HashMap<&'static str, &'static [Role]>> = LazyLock::new(|| {
    HashMap::from([
        // Discovery
        ("rag_list_tools", ALL),
        ("rag_list_templates", ALL),
        ("rag_get_template", ALL),
        // Documents and search
        ("rag_search", ALL),
        ("rag_get_document", ALL),
        ("rag_list_documents", ALL),
        ("rag_ingest", WRITERS),
        ("rag_delete_document", WRITERS),
        // User-scoped memory
        ("mem0_get_user_memory", ALL),
        ("mem0_update_memory", ALL),
        ("mem0_search_memory", ALL),
        // Tenant administration (own tenant)
        ("rag_query_audit_logs", ADMINS),
        ("rag_get_usage_stats", ADMINS),
        ("rag_get_search_analytics", ADMINS),
        ("rag_get_memory_analytics", ADMINS),
        ("rag_get_tenant_health", ADMINS),
        ("rag_backup_tenant_data", ADMINS),
        ("rag_rebuild_index", ADMINS),
        ("rag_validate_backup", ADMINS),
        ("rag_get_subscription_tier", ADMINS),
        ("rag_configure_tenant_models", ADMINS),
        ("rag_update_tenant_config", ADMINS),
        // Platform administration
        ("rag_register_tenant", UBER_ONLY),
        ("rag_delete_tenant", UBER_ONLY),
        ("rag_restore_tenant_data", UBER_ONLY),
        ("rag_update_subscription_tier", UBER_ONLY),
        ("rag_get_system_health", UBER_ONLY),
    ])
});

/// Whether `role` may invoke `tool`. Unknown tools are denied.
#[must_use]
pub fn is_allowed(tool: &str, role: Role) -> bool {
    TOOL_PERMISSIONS
        .get(tool)
        .is_some_and(|roles| roles.contains(&role))
}

/// All tools `role` may invoke, sorted by name
#[must_use]
pub fn tools_for_role(role: Role) -> Vec<&'static str> {
    let mut tools: Vec<&'static str> = TOOL_PERMISSIONS
        .iter()
        .filter(|(_, roles)| roles.contains(&role))
        .map(|(name, _)| *name)
        .collect();
    tools.sort_unstable();
    tools
}

/// Every tool in the matrix, sorted by name
#[must_use]
pub fn all_tools() -> Vec<&'static str> {
    let mut tools: Vec<&'static str> = TOOL_PERMISSIONS.keys().copied().collect();
    tools.sort_unstable();
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_user_cannot_ingest_or_administer() {
        assert!(is_allowed("rag_search", Role::EndUser));
        assert!(!is_allowed("rag_ingest", Role::EndUser));
        assert!(!is_allowed("rag_get_system_health", Role::EndUser));
        assert!(!is_allowed("rag_register_tenant", Role::TenantAdmin));
    }

    #[test]
    fn project_admin_writes_but_does_not_administer() {
        assert!(is_allowed("rag_ingest", Role::ProjectAdmin));
        assert!(is_allowed("rag_delete_document", Role::ProjectAdmin));
        assert!(!is_allowed("rag_backup_tenant_data", Role::ProjectAdmin));
    }

    #[test]
    fn unknown_tool_is_denied_for_all_roles() {
        for role in [
            Role::UberAdmin,
            Role::TenantAdmin,
            Role::ProjectAdmin,
            Role::EndUser,
        ] {
            assert!(!is_allowed("rag_drop_everything", role));
        }
    }

    #[test]
    fn uber_admin_sees_every_tool() {
        assert_eq!(tools_for_role(Role::UberAdmin).len(), all_tools().len());
    }
}

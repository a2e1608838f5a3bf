//! ABOUTME: Tool handlers for ragserve
//! ABOUTME: Leaf operations behind the dispatcher: documents, search, memory, admin

pub mod audit;
pub mod backup;
pub mod discovery;
pub mod documents;
pub mod ingest;
pub mod memory;
pub mod monitoring;
pub mod search;
pub mod templates;
pub mod tenants;

use ragserve_core::traits::cache::CacheStore;
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::keyword::KeywordIndex;
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::Repositories;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::{RagError, Result};
use ragserve_search::HybridSearchService;
use ragserve_tenancy::TenantManager;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared backend handles every tool handler is constructed with
#[derive(Clone)]
pub struct ToolContext {
    pub repos: Repositories,
    pub vector: Arc<dyn VectorIndex>,
    pub objects: Arc<dyn ObjectStore>,
    pub keyword: Arc<dyn KeywordIndex>,
    pub cache: Arc<dyn CacheStore>,
    pub embedder: Arc<dyn EmbeddingModel>,
    pub hybrid: Arc<HybridSearchService>,
    pub tenants: Arc<TenantManager>,
    /// Root directory for backup sets
    pub backup_root: PathBuf,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("backup_root", &self.backup_root)
            .finish_non_exhaustive()
    }
}

/// Every handler the platform registers, one per permission-matrix row
#[must_use]
pub fn all_handlers(ctx: &ToolContext) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(discovery::ListTools),
        Arc::new(templates::ListTemplates::new(ctx.clone())),
        Arc::new(templates::GetTemplate::new(ctx.clone())),
        Arc::new(ingest::Ingest::new(ctx.clone())),
        Arc::new(documents::DeleteDocument::new(ctx.clone())),
        Arc::new(documents::GetDocument::new(ctx.clone())),
        Arc::new(documents::ListDocuments::new(ctx.clone())),
        Arc::new(search::Search::new(ctx.clone())),
        Arc::new(memory::GetUserMemory::new(ctx.clone())),
        Arc::new(memory::UpdateMemory::new(ctx.clone())),
        Arc::new(memory::SearchMemory::new(ctx.clone())),
        Arc::new(audit::QueryAuditLogs::new(ctx.clone())),
        Arc::new(monitoring::GetUsageStats::new(ctx.clone())),
        Arc::new(monitoring::GetSearchAnalytics::new(ctx.clone())),
        Arc::new(monitoring::GetMemoryAnalytics::new(ctx.clone())),
        Arc::new(monitoring::GetTenantHealth::new(ctx.clone())),
        Arc::new(monitoring::GetSystemHealth::new(ctx.clone())),
        Arc::new(backup::BackupTenantData::new(ctx.clone())),
        Arc::new(backup::RestoreTenantData::new(ctx.clone())),
        Arc::new(backup::ValidateBackup::new(ctx.clone())),
        Arc::new(backup::RebuildIndex::new(ctx.clone())),
        Arc::new(tenants::RegisterTenant::new(ctx.clone())),
        Arc::new(tenants::DeleteTenant::new(ctx.clone())),
        Arc::new(tenants::UpdateSubscriptionTier::new(ctx.clone())),
        Arc::new(tenants::GetSubscriptionTier::new(ctx.clone())),
        Arc::new(tenants::ConfigureTenantModels::new(ctx.clone())),
        Arc::new(tenants::UpdateTenantConfig::new(ctx.clone())),
    ]
}

/// Deserialize a tool argument object, mapping failures to validation errors
pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| RagError::validation(format!("invalid arguments: {e}")))
}

/// Pagination guard shared by list/search tools: `1 ≤ limit ≤ 100`
pub(crate) fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > 100 {
        return Err(RagError::validation_field(
            "limit must be between 1 and 100",
            "limit",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_bounds_are_enforced() {
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(101).is_err());
    }
}

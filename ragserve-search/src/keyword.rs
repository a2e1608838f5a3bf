//! Keyword search arm over the tenant's keyword index.
//!
//! The engine evaluates the tenant filter plus type/tag predicates; the date
//! range is applied post-query against the relational records because the
//! engine does not support date predicates natively.

use ragserve_core::traits::keyword::{KeywordFilter, KeywordIndex};
use ragserve_core::traits::relational::DocumentStore;
use ragserve_core::{RagError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Full-text search over the tenant's keyword index
pub struct KeywordSearchService {
    index: Arc<dyn KeywordIndex>,
    documents: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for KeywordSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordSearchService").finish_non_exhaustive()
    }
}

impl KeywordSearchService {
    #[must_use]
    pub fn new(index: Arc<dyn KeywordIndex>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { index, documents }
    }

    /// Ranked `(document_id, relevance)` for a text query, relevance in
    /// `[0, 1]`, best first.
    pub async fn search(
        &self,
        tenant_id: Uuid,
        query_text: &str,
        k: usize,
        filter: &KeywordFilter,
    ) -> Result<Vec<(Uuid, f32)>> {
        if query_text.trim().is_empty() {
            return Err(RagError::validation_field(
                "query text cannot be empty",
                "query_text",
            ));
        }

        debug!(
            tenant_id = %tenant_id,
            k,
            query_length = query_text.len(),
            "running keyword search"
        );
        let mut hits = self.index.search(tenant_id, query_text, k, filter).await?;

        if let Some((from, to)) = filter.date_range {
            let documents = self.documents.enumerate_documents(tenant_id).await?;
            let created: HashMap<Uuid, chrono::DateTime<chrono::Utc>> = documents
                .into_iter()
                .map(|d| (d.document_id, d.created_at))
                .collect();
            hits.retain(|(doc_id, _)| {
                created
                    .get(doc_id)
                    .is_some_and(|ts| *ts >= from && *ts <= to)
            });
        }

        info!(
            tenant_id = %tenant_id,
            requested = k,
            returned = hits.len(),
            "keyword search completed"
        );
        Ok(hits)
    }
}

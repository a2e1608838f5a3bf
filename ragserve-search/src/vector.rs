//! Vector search arm: embed, search the tenant index, resolve internal IDs.
//!
//! Internal index IDs are `fnv1a64(document_id) mod 2^31`; the reverse map is
//! reconstructed per query by enumerating the tenant's non-deleted documents
//! from the relational store. O(tenant documents) per search, acceptable at
//! current scale; a persistent mapping table is a drop-in replacement behind
//! the same contract.

use ragserve_core::ids::vector_internal_id;
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::relational::DocumentStore;
use ragserve_core::traits::vector::{DistanceMetric, VectorIndex};
use ragserve_core::{RagError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Similarity for an L2 distance: `1 / (1 + d)`, in `(0, 1]`
#[must_use]
pub fn l2_similarity(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Similarity for an inner-product score: logistic squash into `(0, 1)`
#[must_use]
pub fn inner_product_similarity(score: f32) -> f32 {
    1.0 / (1.0 + (-score).exp())
}

/// Embedding-based search over the tenant's vector index
pub struct VectorSearchService {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    documents: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for VectorSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSearchService").finish_non_exhaustive()
    }
}

impl VectorSearchService {
    #[must_use]
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            embedder,
            index,
            documents,
        }
    }

    /// Ranked `(document_id, similarity)` for a text query, similarity
    /// normalized to `[0, 1]`, best first.
    pub async fn search(
        &self,
        tenant_id: Uuid,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<(Uuid, f32)>> {
        if query_text.trim().is_empty() {
            return Err(RagError::validation_field(
                "query text cannot be empty",
                "query_text",
            ));
        }

        let embedding = self.embedder.embed(query_text, tenant_id).await?;
        debug!(
            tenant_id = %tenant_id,
            dimension = embedding.len(),
            k,
            "running vector search"
        );

        let raw = self.index.search(tenant_id, &embedding, k).await?;
        if raw.is_empty() {
            info!(tenant_id = %tenant_id, "vector search found no candidates");
            return Ok(Vec::new());
        }

        let metric = self.index.metric();
        let mut scores: HashMap<u32, f32> = HashMap::with_capacity(raw.len());
        for (internal_id, raw_score) in raw {
            let similarity = match metric {
                DistanceMetric::L2 => l2_similarity(raw_score),
                DistanceMetric::InnerProduct => inner_product_similarity(raw_score),
            };
            scores.insert(internal_id, similarity);
        }

        // Reverse-map internal IDs by enumerating the tenant's documents;
        // internal IDs with no surviving document are dropped
        let documents = self.documents.enumerate_documents(tenant_id).await?;
        let mut resolved: Vec<(Uuid, f32)> = documents
            .iter()
            .filter_map(|doc| {
                scores
                    .get(&vector_internal_id(&doc.document_id))
                    .map(|score| (doc.document_id, *score))
            })
            .collect();
        resolved.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        info!(
            tenant_id = %tenant_id,
            requested = k,
            returned = resolved.len(),
            "vector search completed"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_similarity_maps_zero_distance_to_one() {
        assert!((l2_similarity(0.0) - 1.0).abs() < f32::EPSILON);
        assert!(l2_similarity(1.0) < l2_similarity(0.5));
        // Negative distances are clamped rather than exceeding 1.0
        assert!(l2_similarity(-3.0) <= 1.0);
    }

    #[test]
    fn inner_product_similarity_is_monotonic_in_unit_interval() {
        let low = inner_product_similarity(-4.0);
        let mid = inner_product_similarity(0.0);
        let high = inner_product_similarity(4.0);
        assert!(low < mid && mid < high);
        assert!((mid - 0.5).abs() < 1e-6);
        assert!(low > 0.0 && high < 1.0);
    }
}

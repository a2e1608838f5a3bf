//! Local deterministic embedding model.
//!
//! The embedding client is an opaque `text → vector` function whose dimension
//! comes from the tenant's configuration. This implementation feature-hashes
//! tokens into a unit vector: deterministic across processes, cheap, and
//! similar texts land near each other, which is all the retrieval pipeline
//! asks of it. Remote providers slot in behind the same trait.

use async_trait::async_trait;
use ragserve_core::ids::fnv1a64;
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::relational::TenantStore;
use ragserve_core::{RagError, Result};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Feature-hashing embedder with tenant-configured dimension
pub struct LocalHashEmbedder {
    tenants: Arc<dyn TenantStore>,
    default_dimension: usize,
}

impl std::fmt::Debug for LocalHashEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHashEmbedder")
            .field("default_dimension", &self.default_dimension)
            .finish_non_exhaustive()
    }
}

impl LocalHashEmbedder {
    #[must_use]
    pub fn new(tenants: Arc<dyn TenantStore>, default_dimension: usize) -> Self {
        Self {
            tenants,
            default_dimension,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a64(token.as_bytes());
            let idx = (hash % dimension as u64) as usize;
            // Second hash decides the sign so collisions cancel rather than pile up
            let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[idx] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingModel for LocalHashEmbedder {
    async fn embed(&self, text: &str, tenant_id: Uuid) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::validation_field(
                "text cannot be empty",
                "text",
            ));
        }
        let dimension = self
            .tenants
            .get_config(tenant_id)
            .await?
            .map_or(self.default_dimension, |c| c.embedding_dimension);
        debug!(tenant_id = %tenant_id, dimension, chars = text.len(), "generating embedding");
        Ok(Self::hash_embed(text, dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_deterministic_and_normalized() {
        let a = LocalHashEmbedder::hash_embed("alpha beta gamma", 64);
        let b = LocalHashEmbedder::hash_embed("alpha beta gamma", 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn overlapping_texts_are_closer_than_disjoint_ones() {
        let query = LocalHashEmbedder::hash_embed("alpha beta", 128);
        let near = LocalHashEmbedder::hash_embed("alpha report", 128);
        let far = LocalHashEmbedder::hash_embed("zeta omega", 128);

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt()
        };
        assert!(dist(&query, &near) < dist(&query, &far));
    }
}

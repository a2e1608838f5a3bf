//! Per-tenant vector index trait

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Distance metric the index was built with. Raw scores are normalized by the
/// search service: `1/(1+d)` for L2 distance, sigmoid for inner product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    L2,
    InnerProduct,
}

/// One tenant, one index. Adapters validate the addressed tenant against the
/// request context before every read or write; a mismatch is a
/// tenant-isolation error.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create an empty index for the tenant with the given dimension
    async fn create(&self, tenant_id: Uuid, dimension: usize) -> Result<()>;

    /// Add one embedding. If the existing index has a different dimension it
    /// is rebuilt empty at the new dimension first.
    async fn add(&self, tenant_id: Uuid, document_id: Uuid, embedding: Vec<f32>) -> Result<()>;

    /// Raw nearest-neighbour search: `(internal_id, raw_score)` pairs,
    /// best-first for the index's metric
    async fn search(&self, tenant_id: Uuid, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>>;

    /// Best-effort removal; flat indices tombstone at the application layer
    async fn remove(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()>;

    /// Persist the tenant's index to its file
    async fn save(&self, tenant_id: Uuid) -> Result<()>;

    /// Drop the tenant's index and its file
    async fn delete(&self, tenant_id: Uuid) -> Result<()>;

    /// Live (non-tombstoned) entry count
    async fn ntotal(&self, tenant_id: Uuid) -> Result<usize>;

    /// Metric in force for this index family
    fn metric(&self) -> DistanceMetric;

    /// Replace the tenant's index wholesale, used by `rag_rebuild_index`.
    /// Returns the number of entries indexed.
    async fn rebuild(
        &self,
        tenant_id: Uuid,
        dimension: usize,
        entries: Vec<(Uuid, Vec<f32>)>,
    ) -> Result<usize>;

    /// Serialized index bytes for backup, `None` if the tenant has no index
    async fn export_bytes(&self, tenant_id: Uuid) -> Result<Option<Vec<u8>>>;

    /// Restore the tenant's index from serialized bytes
    async fn import_bytes(&self, tenant_id: Uuid, bytes: &[u8]) -> Result<()>;
}

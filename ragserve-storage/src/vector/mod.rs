//! Flat per-tenant vector index.
//!
//! Exact (brute-force) scoring over the tenant's embeddings, matching the
//! semantics of a FAISS `IndexFlat*`. Removal tombstones at the application
//! layer. Each tenant's index persists to `tenant_{tenant_id}.index` under
//! the configured root (MessagePack), with a writable fallback root when the
//! primary is not writable.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use ragserve_core::context::check_resource_tenant;
use ragserve_core::ids::vector_internal_id;
use ragserve_core::traits::vector::{DistanceMetric, VectorIndex};
use ragserve_core::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    internal_id: u32,
    embedding: Vec<f32>,
    deleted: bool,
}

/// Serialized index file shape
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TenantIndex {
    dimension: usize,
    metric: DistanceMetric,
    entries: Vec<IndexEntry>,
}

impl TenantIndex {
    const fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: Vec::new(),
        }
    }

    fn live_len(&self) -> usize {
        self.entries.iter().filter(|e| !e.deleted).count()
    }

    /// Raw scores, best-first for the metric: ascending distance for L2,
    /// descending dot product for inner product.
    fn search(&self, query: &[f32], k: usize) -> Vec<(u32, f32)> {
        let mut scored: Vec<(u32, f32)> = self
            .entries
            .iter()
            .filter(|e| !e.deleted && e.embedding.len() == query.len())
            .map(|e| (e.internal_id, Self::raw_score(self.metric, &e.embedding, query)))
            .collect();
        match self.metric {
            DistanceMetric::L2 => {
                scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            }
            DistanceMetric::InnerProduct => {
                scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            }
        }
        scored.truncate(k);
        scored
    }

    fn raw_score(metric: DistanceMetric, stored: &[f32], query: &[f32]) -> f32 {
        match metric {
            DistanceMetric::L2 => stored
                .iter()
                .zip(query)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
            DistanceMetric::InnerProduct => stored.iter().zip(query).map(|(a, b)| a * b).sum(),
        }
    }
}

/// Registry of per-tenant flat indices with file persistence
pub struct FlatVectorIndex {
    root: PathBuf,
    metric: DistanceMetric,
    indices: DashMap<Uuid, Arc<RwLock<TenantIndex>>>,
}

impl std::fmt::Debug for FlatVectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlatVectorIndex")
            .field("root", &self.root)
            .field("metric", &self.metric)
            .finish_non_exhaustive()
    }
}

impl FlatVectorIndex {
    /// Open the index registry at `root`, falling back to `fallback_root`
    /// when the primary is not writable.
    pub fn open(root: &Path, fallback_root: &Path, metric: DistanceMetric) -> Result<Self> {
        let root = Self::resolve_writable_root(root, fallback_root)?;
        Ok(Self {
            root,
            metric,
            indices: DashMap::new(),
        })
    }

    fn resolve_writable_root(primary: &Path, fallback: &Path) -> Result<PathBuf> {
        for candidate in [primary, fallback] {
            if std::fs::create_dir_all(candidate).is_ok() {
                let probe = candidate.join(".write-probe");
                if std::fs::write(&probe, b"ok").is_ok() {
                    let _ = std::fs::remove_file(&probe);
                    return Ok(candidate.to_path_buf());
                }
            }
            warn!(path = %candidate.display(), "vector index root not writable");
        }
        Err(RagError::internal(
            "no writable root available for vector indices",
        ))
    }

    /// Index file path for a tenant
    #[must_use]
    pub fn index_path(&self, tenant_id: Uuid) -> PathBuf {
        self.root.join(format!("tenant_{tenant_id}.index"))
    }

    /// In-memory handle, loading from disk on first access
    fn handle(&self, tenant_id: Uuid) -> Result<Option<Arc<RwLock<TenantIndex>>>> {
        if let Some(handle) = self.indices.get(&tenant_id) {
            return Ok(Some(Arc::clone(handle.value())));
        }
        let path = self.index_path(tenant_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)
            .map_err(|e| RagError::transient(format!("cannot read index file: {e}")))?;
        let index: TenantIndex = rmp_serde::from_slice(&bytes)
            .map_err(|e| RagError::internal(format!("corrupt index file {}: {e}", path.display())))?;
        debug!(tenant_id = %tenant_id, entries = index.entries.len(), "loaded vector index from disk");
        let handle = Arc::new(RwLock::new(index));
        self.indices.insert(tenant_id, handle.clone());
        Ok(Some(handle))
    }

    fn handle_or_create(&self, tenant_id: Uuid, dimension: usize) -> Result<Arc<RwLock<TenantIndex>>> {
        if let Some(handle) = self.handle(tenant_id)? {
            return Ok(handle);
        }
        let handle = Arc::new(RwLock::new(TenantIndex::new(dimension, self.metric)));
        self.indices.insert(tenant_id, handle.clone());
        Ok(handle)
    }

    fn persist(&self, tenant_id: Uuid, snapshot: &TenantIndex) -> Result<()> {
        let bytes = rmp_serde::to_vec(snapshot)
            .map_err(|e| RagError::internal(format!("cannot serialize index: {e}")))?;
        std::fs::write(self.index_path(tenant_id), bytes)
            .map_err(|e| RagError::transient(format!("cannot write index file: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FlatVectorIndex {
    async fn create(&self, tenant_id: Uuid, dimension: usize) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let handle = Arc::new(RwLock::new(TenantIndex::new(dimension, self.metric)));
        self.indices.insert(tenant_id, handle.clone());
        let snapshot = handle.read().clone();
        self.persist(tenant_id, &snapshot)?;
        info!(tenant_id = %tenant_id, dimension, "created vector index");
        Ok(())
    }

    async fn add(&self, tenant_id: Uuid, document_id: Uuid, embedding: Vec<f32>) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        if embedding.is_empty() {
            return Err(RagError::validation_field(
                "embedding cannot be empty",
                "embedding",
            ));
        }
        let handle = self.handle_or_create(tenant_id, embedding.len())?;
        let internal_id = vector_internal_id(&document_id);
        {
            let mut index = handle.write();
            if index.dimension != embedding.len() {
                warn!(
                    tenant_id = %tenant_id,
                    existing = index.dimension,
                    required = embedding.len(),
                    "vector index dimension mismatch, rebuilding"
                );
                *index = TenantIndex::new(embedding.len(), self.metric);
            }
            // Re-ingestion replaces the prior vector for the same document
            index.entries.retain(|e| e.internal_id != internal_id);
            index.entries.push(IndexEntry {
                internal_id,
                embedding,
                deleted: false,
            });
        }
        Ok(())
    }

    async fn search(&self, tenant_id: Uuid, query: &[f32], k: usize) -> Result<Vec<(u32, f32)>> {
        check_resource_tenant(tenant_id)?;
        let Some(handle) = self.handle(tenant_id)? else {
            return Ok(Vec::new());
        };
        let results = handle.read().search(query, k);
        Ok(results)
    }

    async fn remove(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let Some(handle) = self.handle(tenant_id)? else {
            return Ok(());
        };
        let internal_id = vector_internal_id(&document_id);
        let mut index = handle.write();
        for entry in index
            .entries
            .iter_mut()
            .filter(|e| e.internal_id == internal_id)
        {
            entry.deleted = true;
        }
        Ok(())
    }

    async fn save(&self, tenant_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let Some(handle) = self.handle(tenant_id)? else {
            return Ok(());
        };
        let snapshot = handle.read().clone();
        let this_path = self.index_path(tenant_id);
        let bytes = rmp_serde::to_vec(&snapshot)
            .map_err(|e| RagError::internal(format!("cannot serialize index: {e}")))?;
        tokio::task::spawn_blocking(move || std::fs::write(this_path, bytes))
            .await
            .map_err(|e| RagError::internal(format!("save task failed: {e}")))?
            .map_err(|e| RagError::transient(format!("cannot write index file: {e}")))?;
        Ok(())
    }

    async fn delete(&self, tenant_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        self.indices.remove(&tenant_id);
        let path = self.index_path(tenant_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| RagError::transient(format!("cannot delete index file: {e}")))?;
        }
        info!(tenant_id = %tenant_id, "deleted vector index");
        Ok(())
    }

    async fn ntotal(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        match self.handle(tenant_id)? {
            Some(handle) => Ok(handle.read().live_len()),
            None => Ok(0),
        }
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn rebuild(
        &self,
        tenant_id: Uuid,
        dimension: usize,
        entries: Vec<(Uuid, Vec<f32>)>,
    ) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        let mut index = TenantIndex::new(dimension, self.metric);
        for (document_id, embedding) in entries {
            if embedding.len() != dimension {
                return Err(RagError::validation(format!(
                    "embedding for document {document_id} has dimension {}, expected {dimension}",
                    embedding.len()
                )));
            }
            index.entries.push(IndexEntry {
                internal_id: vector_internal_id(&document_id),
                embedding,
                deleted: false,
            });
        }
        let count = index.entries.len();
        self.persist(tenant_id, &index)?;
        self.indices.insert(tenant_id, Arc::new(RwLock::new(index)));
        info!(tenant_id = %tenant_id, entries = count, "rebuilt vector index");
        Ok(count)
    }

    async fn export_bytes(&self, tenant_id: Uuid) -> Result<Option<Vec<u8>>> {
        check_resource_tenant(tenant_id)?;
        match self.handle(tenant_id)? {
            Some(handle) => {
                let snapshot = handle.read().clone();
                let bytes = rmp_serde::to_vec(&snapshot)
                    .map_err(|e| RagError::internal(format!("cannot serialize index: {e}")))?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    async fn import_bytes(&self, tenant_id: Uuid, bytes: &[u8]) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let index: TenantIndex = rmp_serde::from_slice(bytes)
            .map_err(|e| RagError::validation(format!("invalid index bytes: {e}")))?;
        self.persist(tenant_id, &index)?;
        self.indices.insert(tenant_id, Arc::new(RwLock::new(index)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::context::{scope, RequestContext};
    use ragserve_core::model::user::Role;

    fn ctx(tenant: Uuid) -> RequestContext {
        RequestContext::new()
            .with_tenant(tenant)
            .with_role(Role::TenantAdmin)
    }

    fn open_index(dir: &tempfile::TempDir) -> FlatVectorIndex {
        FlatVectorIndex::open(dir.path(), dir.path(), DistanceMetric::L2).unwrap()
    }

    #[tokio::test]
    async fn add_search_orders_by_distance() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_index(&dir);
        let tenant = Uuid::new_v4();
        let near = Uuid::new_v4();
        let far = Uuid::new_v4();

        scope(ctx(tenant), async {
            index.add(tenant, near, vec![1.0, 0.0]).await.unwrap();
            index.add(tenant, far, vec![0.0, 1.0]).await.unwrap();

            let hits = index.search(tenant, &[0.9, 0.1], 10).await.unwrap();
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0, ragserve_core::ids::vector_internal_id(&near));
            assert!(hits[0].1 < hits[1].1);
        })
        .await;
    }

    #[tokio::test]
    async fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let tenant = Uuid::new_v4();
        let doc = Uuid::new_v4();

        scope(ctx(tenant), async {
            let index = open_index(&dir);
            index.add(tenant, doc, vec![0.5, 0.5, 0.5]).await.unwrap();
            index.save(tenant).await.unwrap();

            // Fresh registry reads the persisted file
            let reopened = open_index(&dir);
            assert_eq!(reopened.ntotal(tenant).await.unwrap(), 1);
            let hits = reopened.search(tenant, &[0.5, 0.5, 0.5], 1).await.unwrap();
            assert_eq!(hits[0].0, ragserve_core::ids::vector_internal_id(&doc));
        })
        .await;
    }

    #[tokio::test]
    async fn dimension_mismatch_rebuilds_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_index(&dir);
        let tenant = Uuid::new_v4();

        scope(ctx(tenant), async {
            index.add(tenant, Uuid::new_v4(), vec![1.0, 2.0]).await.unwrap();
            index
                .add(tenant, Uuid::new_v4(), vec![1.0, 2.0, 3.0])
                .await
                .unwrap();
            // Rebuild dropped the two-dimensional entry
            assert_eq!(index.ntotal(tenant).await.unwrap(), 1);
        })
        .await;
    }

    #[tokio::test]
    async fn tombstoned_documents_disappear_from_search() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_index(&dir);
        let tenant = Uuid::new_v4();
        let doc = Uuid::new_v4();

        scope(ctx(tenant), async {
            index.add(tenant, doc, vec![1.0, 0.0]).await.unwrap();
            index.remove(tenant, doc).await.unwrap();
            assert!(index.search(tenant, &[1.0, 0.0], 10).await.unwrap().is_empty());
            assert_eq!(index.ntotal(tenant).await.unwrap(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn foreign_tenant_context_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let index = open_index(&dir);
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();

        scope(ctx(other), async {
            let err = index.search(tenant, &[1.0], 5).await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::TenantIsolation);
        })
        .await;
    }
}

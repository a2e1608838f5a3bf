//! Vector search against the flat index with relational ID resolution.

use async_trait::async_trait;
use ragserve_core::context::{scope, RequestContext};
use ragserve_core::model::document::Document;
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::relational::DocumentStore;
use ragserve_core::traits::vector::{DistanceMetric, VectorIndex};
use ragserve_core::{Result, Role};
use ragserve_search::VectorSearchService;
use ragserve_storage::{FlatVectorIndex, MemoryRelational};
use std::sync::Arc;
use uuid::Uuid;

/// Maps a handful of known words onto fixed axes so distances are exact
struct AxisEmbedder;

#[async_trait]
impl EmbeddingModel for AxisEmbedder {
    async fn embed(&self, text: &str, _tenant_id: Uuid) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; 3];
        for token in text.split_whitespace() {
            match token {
                "alpha" => v[0] += 1.0,
                "beta" => v[1] += 1.0,
                _ => v[2] += 1.0,
            }
        }
        Ok(v)
    }
}

fn ctx(tenant: Uuid) -> RequestContext {
    RequestContext::new()
        .with_tenant(tenant)
        .with_role(Role::ProjectAdmin)
}

async fn seed_document(
    relational: &Arc<MemoryRelational>,
    index: &FlatVectorIndex,
    embedder: &AxisEmbedder,
    tenant: Uuid,
    title: &str,
) -> Uuid {
    let doc = Document::new(tenant, Uuid::new_v4(), title, format!("hash-{title}"));
    let doc_id = doc.document_id;
    relational.insert_document(doc).await.unwrap();
    let embedding = embedder.embed(title, tenant).await.unwrap();
    index.add(tenant, doc_id, embedding).await.unwrap();
    doc_id
}

#[tokio::test]
async fn resolution_preserves_similarity_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let relational = MemoryRelational::new();
    let index = Arc::new(
        FlatVectorIndex::open(dir.path(), dir.path(), DistanceMetric::L2).unwrap(),
    );
    let tenant = Uuid::new_v4();

    scope(ctx(tenant), async {
        let alpha = seed_document(&relational, &index, &AxisEmbedder, tenant, "alpha").await;
        let beta = seed_document(&relational, &index, &AxisEmbedder, tenant, "beta").await;
        let other = seed_document(&relational, &index, &AxisEmbedder, tenant, "unrelated").await;

        let service = VectorSearchService::new(
            Arc::new(AxisEmbedder),
            index.clone(),
            relational.clone(),
        );
        let results = service.search(tenant, "alpha alpha beta", 10).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0, alpha);
        assert_eq!(results[1].0, beta);
        assert_eq!(results[2].0, other);
        // Similarities are normalized into (0, 1] and strictly ordered here
        assert!(results[0].1 > results[1].1);
        assert!(results[1].1 > results[2].1);
        assert!(results[0].1 <= 1.0);
    })
    .await;
}

#[tokio::test]
async fn soft_deleted_documents_are_dropped_during_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let relational = MemoryRelational::new();
    let index = Arc::new(
        FlatVectorIndex::open(dir.path(), dir.path(), DistanceMetric::L2).unwrap(),
    );
    let tenant = Uuid::new_v4();

    scope(ctx(tenant), async {
        let doomed = seed_document(&relational, &index, &AxisEmbedder, tenant, "alpha").await;

        // Tombstone only the relational row; the vector stays in the index
        let mut doc = relational.get_document(tenant, doomed).await.unwrap().unwrap();
        doc.deleted_at = Some(chrono::Utc::now());
        relational.update_document(doc).await.unwrap();

        let service = VectorSearchService::new(
            Arc::new(AxisEmbedder),
            index.clone(),
            relational.clone(),
        );
        let results = service.search(tenant, "alpha", 10).await.unwrap();
        assert!(results.is_empty());
    })
    .await;
}

#[tokio::test]
async fn empty_query_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let relational = MemoryRelational::new();
    let index = Arc::new(
        FlatVectorIndex::open(dir.path(), dir.path(), DistanceMetric::L2).unwrap(),
    );
    let service = VectorSearchService::new(Arc::new(AxisEmbedder), index, relational.clone());

    let err = service.search(Uuid::new_v4(), "  ", 5).await.unwrap_err();
    assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
}

//! Document ingestion across all four backends.
//!
//! Write order: relational row, object bytes, embedding, vector index,
//! keyword index. Any failure after the relational commit triggers
//! compensating deletes in reverse order (keyword → vector → object) and the
//! row is tombstoned, so a half-ingested document never surfaces in reads.

use crate::{parse_args, ToolContext};
use async_trait::async_trait;
use chrono::Utc;
use ragserve_core::context;
use ragserve_core::model::document::{hash_content, Document, DocumentVersion};
use ragserve_core::traits::embedding::EmbeddingModel;
use ragserve_core::traits::keyword::{KeywordDocument, KeywordIndex};
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::DocumentStore;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::{RagError, Result};
use ragserve_storage::{with_backoff, RetryPolicy};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct IngestArgs {
    document_content: String,
    metadata: HashMap<String, Value>,
    tenant_id: Option<Uuid>,
    document_id: Option<Uuid>,
    change_summary: Option<String>,
}

/// `rag_ingest`
pub struct Ingest {
    ctx: ToolContext,
    retry: RetryPolicy,
}

impl Ingest {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            ctx,
            retry: RetryPolicy::default(),
        }
    }

    async fn compensate(&self, tenant_id: Uuid, document_id: Uuid) -> Vec<&'static str> {
        let mut compensated = Vec::new();
        if self
            .ctx
            .keyword
            .remove_document(tenant_id, document_id)
            .await
            .is_ok()
        {
            compensated.push("meilisearch");
        }
        if self.ctx.vector.remove(tenant_id, document_id).await.is_ok() {
            compensated.push("faiss");
        }
        if self
            .ctx
            .objects
            .delete(tenant_id, &format!("documents/{document_id}"))
            .await
            .is_ok()
        {
            compensated.push("minio");
        }
        compensated
    }
}

#[async_trait]
impl ToolHandler for Ingest {
    fn name(&self) -> &'static str {
        "rag_ingest"
    }

    fn description(&self) -> &'static str {
        "Ingest a document into all backends"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: IngestArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        let user_id = context::require_user()?;

        if args.document_content.is_empty() {
            return Err(RagError::validation_field(
                "document content cannot be empty",
                "document_content",
            ));
        }
        let title = args
            .metadata
            .get("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RagError::validation_field("metadata.title is required", "metadata.title")
            })?
            .to_string();

        let content_bytes = args.document_content.as_bytes();
        let content_hash = hash_content(content_bytes);

        // Dedup over non-deleted documents of the tenant
        if let Some(existing) = self
            .ctx
            .repos
            .documents
            .find_by_hash(tenant_id, &content_hash)
            .await?
        {
            if args.document_id.is_none() || args.document_id == Some(existing.document_id) {
                info!(
                    tenant_id = %tenant_id,
                    document_id = %existing.document_id,
                    "duplicate content, skipping ingestion"
                );
                return Ok(json!({
                    "document_id": existing.document_id,
                    "existing_document_id": existing.document_id,
                    "status": "duplicate",
                    "content_hash": content_hash,
                }));
            }
        }

        // New document, or a new version of a supplied document id
        let prior = match args.document_id {
            Some(id) => self.ctx.repos.documents.get_document(tenant_id, id).await?,
            None => None,
        };
        let document = match prior {
            Some(mut existing) if existing.content_hash != content_hash => {
                let snapshot =
                    DocumentVersion::snapshot(&existing, user_id, args.change_summary.clone());
                self.ctx.repos.documents.insert_version(snapshot).await?;
                existing.version_number += 1;
                existing.title = title;
                existing.content_hash = content_hash.clone();
                existing.metadata = args.metadata;
                existing.updated_at = Utc::now();
                existing.deleted_at = None;
                self.ctx
                    .repos
                    .documents
                    .update_document(existing.clone())
                    .await?;
                existing
            }
            Some(mut existing) => {
                // Same hash under the same id: re-ingest restores a tombstoned
                // document without a new version
                existing.deleted_at = None;
                existing.updated_at = Utc::now();
                self.ctx
                    .repos
                    .documents
                    .update_document(existing.clone())
                    .await?;
                existing
            }
            None => {
                let mut document =
                    Document::new(tenant_id, user_id, title, content_hash.clone())
                        .with_metadata(args.metadata);
                if let Some(id) = args.document_id {
                    document.document_id = id;
                }
                self.ctx
                    .repos
                    .documents
                    .insert_document(document.clone())
                    .await?;
                document
            }
        };
        let document_id = document.document_id;

        // Backend writes; everything past here compensates on failure
        let outcome: Result<usize> = async {
            self.ctx.objects.ensure_bucket(tenant_id).await?;
            self.ctx
                .objects
                .put(tenant_id, &format!("documents/{document_id}"), content_bytes)
                .await?;

            // Embedding failures are retryable for ingestion (not for search)
            let embedding = with_backoff(&self.retry, "embed", || async {
                self.ctx
                    .embedder
                    .embed(&args.document_content, tenant_id)
                    .await
            })
            .await?;
            let dimension = embedding.len();

            self.ctx.vector.add(tenant_id, document_id, embedding).await?;
            self.ctx.vector.save(tenant_id).await?;

            self.ctx.keyword.ensure_index(tenant_id).await?;
            self.ctx
                .keyword
                .add_document(KeywordDocument {
                    document_id,
                    tenant_id,
                    title: document.title.clone(),
                    content: args.document_content.clone(),
                    metadata: document.metadata.clone(),
                })
                .await?;
            Ok(dimension)
        }
        .await;

        match outcome {
            Ok(dimension) => {
                self.ctx
                    .tenants
                    .record_document(tenant_id, content_bytes.len() as u64)
                    .await;
                self.ctx.tenants.record_embedding(tenant_id).await;
                info!(
                    tenant_id = %tenant_id,
                    document_id = %document_id,
                    version = document.version_number,
                    "document ingested"
                );
                Ok(json!({
                    "document_id": document_id,
                    "status": "success",
                    "indexed_in": ["postgresql", "minio", "faiss", "meilisearch"],
                    "embedding_dimension": dimension,
                    "content_hash": content_hash,
                    "version_number": document.version_number,
                }))
            }
            Err(err) => {
                warn!(
                    tenant_id = %tenant_id,
                    document_id = %document_id,
                    error = %err,
                    "ingestion failed after commit, compensating"
                );
                let compensated = self.compensate(tenant_id, document_id).await;
                let mut tombstone = document;
                tombstone.deleted_at = Some(Utc::now());
                if let Err(cleanup_err) =
                    self.ctx.repos.documents.update_document(tombstone).await
                {
                    warn!(error = %cleanup_err, "failed to tombstone partially ingested document");
                }
                Err(RagError::internal(format!(
                    "ingestion failed: {err}; compensated backends: {compensated:?}"
                )))
            }
        }
    }
}

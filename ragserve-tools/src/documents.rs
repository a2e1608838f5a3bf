//! Document management: delete, get, list.

use crate::{parse_args, validate_limit, ToolContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragserve_core::context;
use ragserve_core::traits::keyword::KeywordIndex;
use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::{DocumentFilter, DocumentStore};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_core::{RagError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct DeleteDocumentArgs {
    document_id: Uuid,
    tenant_id: Option<Uuid>,
}

/// `rag_delete_document`: soft delete plus best-effort index removal. The
/// object bytes are retained for the 30-day recovery window.
pub struct DeleteDocument {
    ctx: ToolContext,
}

impl DeleteDocument {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for DeleteDocument {
    fn name(&self) -> &'static str {
        "rag_delete_document"
    }

    fn description(&self) -> &'static str {
        "Soft-delete a document"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: DeleteDocumentArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;

        let Some(mut document) = self
            .ctx
            .repos
            .documents
            .get_document(tenant_id, args.document_id)
            .await?
        else {
            return Err(RagError::not_found(format!(
                "document {} not found",
                args.document_id
            )));
        };

        if document.is_deleted() {
            return Ok(json!({
                "document_id": document.document_id,
                "status": "already_deleted",
            }));
        }

        document.deleted_at = Some(Utc::now());
        document.updated_at = Utc::now();
        self.ctx
            .repos
            .documents
            .update_document(document.clone())
            .await?;

        // Index removal is best-effort; failures are logged, the tombstone
        // already hides the document from reads
        if let Err(err) = self.ctx.vector.remove(tenant_id, args.document_id).await {
            warn!(error = %err, document_id = %args.document_id, "vector removal failed");
        } else if let Err(err) = self.ctx.vector.save(tenant_id).await {
            warn!(error = %err, "vector index save failed after removal");
        }
        if let Err(err) = self
            .ctx
            .keyword
            .remove_document(tenant_id, args.document_id)
            .await
        {
            warn!(error = %err, document_id = %args.document_id, "keyword removal failed");
        }

        info!(tenant_id = %tenant_id, document_id = %args.document_id, "document deleted");
        Ok(json!({
            "document_id": args.document_id,
            "status": "deleted",
            "recovery_window_days": 30,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct GetDocumentArgs {
    document_id: Uuid,
    tenant_id: Option<Uuid>,
}

/// `rag_get_document`
pub struct GetDocument {
    ctx: ToolContext,
}

impl GetDocument {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetDocument {
    fn name(&self) -> &'static str {
        "rag_get_document"
    }

    fn description(&self) -> &'static str {
        "Fetch one document with its content"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: GetDocumentArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;

        let document = self
            .ctx
            .repos
            .documents
            .get_document(tenant_id, args.document_id)
            .await?
            .filter(|d| !d.is_deleted())
            .ok_or_else(|| {
                RagError::not_found(format!("document {} not found", args.document_id))
            })?;

        // Content comes from the object store; a fetch failure degrades to
        // empty content rather than failing the read
        let content = match self
            .ctx
            .objects
            .get(tenant_id, &format!("documents/{}", document.document_id))
            .await
        {
            Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(None) => String::new(),
            Err(err) => {
                warn!(error = %err, document_id = %document.document_id, "object fetch failed");
                String::new()
            }
        };

        Ok(json!({
            "document_id": document.document_id,
            "title": document.title,
            "metadata": document.metadata,
            "version_number": document.version_number,
            "content": content,
            "content_hash": document.content_hash,
            "created_at": document.created_at,
            "updated_at": document.updated_at,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct ListDocumentsArgs {
    tenant_id: Option<Uuid>,
    document_type: Option<String>,
    source: Option<String>,
    title_contains: Option<String>,
    created_after: Option<DateTime<Utc>>,
    created_before: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

const fn default_limit() -> usize {
    20
}

/// `rag_list_documents`
pub struct ListDocuments {
    ctx: ToolContext,
}

impl ListDocuments {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for ListDocuments {
    fn name(&self) -> &'static str {
        "rag_list_documents"
    }

    fn description(&self) -> &'static str {
        "Paginated document listing with filters"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: ListDocumentsArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        validate_limit(args.limit)?;

        let filter = DocumentFilter {
            document_type: args.document_type,
            source: args.source,
            title_contains: args.title_contains,
            created_after: args.created_after,
            created_before: args.created_before,
        };
        let (documents, total) = self
            .ctx
            .repos
            .documents
            .list_documents(tenant_id, &filter, args.limit, args.offset)
            .await?;

        let rendered: Vec<Value> = documents
            .iter()
            .map(|d| {
                json!({
                    "document_id": d.document_id,
                    "title": d.title,
                    "metadata": d.metadata,
                    "version_number": d.version_number,
                    "created_at": d.created_at,
                    "updated_at": d.updated_at,
                })
            })
            .collect();
        Ok(json!({
            "documents": rendered,
            "total": total,
            "limit": args.limit,
            "offset": args.offset,
        }))
    }
}

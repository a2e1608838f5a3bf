//! Opaque text → vector embedding client

use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Embedding client. The tenant's configuration selects the model and with it
/// the vector dimension. Empty input is a validation error; network or quota
/// failures surface as transient errors, retryable upstream only for
/// ingestion, never for search.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str, tenant_id: Uuid) -> Result<Vec<f32>>;
}

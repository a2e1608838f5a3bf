//! In-process keyword index.
//!
//! One logical index per tenant, named `tenant-{tenant_id}`, with `title`,
//! `content`, and metadata string values searchable. Scoring is BM25 with
//! scores normalized to `[0, 1]` (best hit = 1.0), matching the engine-side
//! ranking contract the search service expects.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use ragserve_core::context::check_resource_tenant;
use ragserve_core::traits::keyword::{KeywordDocument, KeywordFilter, KeywordIndex};
use ragserve_core::{RagError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

#[derive(Debug, Clone)]
struct IndexedDocument {
    doc: KeywordDocument,
    term_freq: HashMap<String, u32>,
    length: u32,
}

#[derive(Debug, Default)]
struct TenantKeywordIndex {
    docs: HashMap<Uuid, IndexedDocument>,
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl TenantKeywordIndex {
    fn index(&mut self, doc: KeywordDocument) {
        let mut term_freq: HashMap<String, u32> = HashMap::new();
        let mut length = 0u32;
        let metadata_text: String = doc
            .metadata
            .values()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        for token in tokenize(&doc.title)
            .into_iter()
            .chain(tokenize(&doc.content))
            .chain(tokenize(&metadata_text))
        {
            *term_freq.entry(token).or_insert(0) += 1;
            length += 1;
        }
        self.docs.insert(
            doc.document_id,
            IndexedDocument {
                doc,
                term_freq,
                length,
            },
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn search(&self, tenant_id: Uuid, query: &str, k: usize, filter: &KeywordFilter) -> Vec<(Uuid, f32)> {
        let terms = tokenize(query);
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<&IndexedDocument> = self
            .docs
            .values()
            .filter(|d| d.doc.tenant_id == tenant_id && filter.matches_metadata(&d.doc.metadata))
            .collect();
        if candidates.is_empty() {
            return Vec::new();
        }

        let n = candidates.len() as f32;
        let avg_len =
            candidates.iter().map(|d| d.length as f32).sum::<f32>() / n.max(1.0);

        let mut scored: Vec<(Uuid, f32)> = candidates
            .iter()
            .filter_map(|d| {
                let mut score = 0.0f32;
                for term in &terms {
                    let tf = *d.term_freq.get(term).unwrap_or(&0) as f32;
                    if tf == 0.0 {
                        continue;
                    }
                    let df = candidates
                        .iter()
                        .filter(|c| c.term_freq.contains_key(term))
                        .count() as f32;
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm = BM25_K1
                        * (1.0 - BM25_B + BM25_B * d.length as f32 / avg_len.max(1.0));
                    score += idf * (tf * (BM25_K1 + 1.0)) / (tf + norm);
                }
                (score > 0.0).then_some((d.doc.document_id, score))
            })
            .collect();

        // Normalize to [0, 1] with the best hit at 1.0, stable tie order
        if let Some(max) = scored
            .iter()
            .map(|(_, s)| *s)
            .fold(None::<f32>, |acc, s| Some(acc.map_or(s, |m| m.max(s))))
        {
            if max > 0.0 {
                for (_, s) in &mut scored {
                    *s /= max;
                }
            }
        }
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }
}

/// Registry of per-tenant keyword indices
#[derive(Default)]
pub struct MemoryKeywordIndex {
    indices: DashMap<Uuid, Arc<RwLock<TenantKeywordIndex>>>,
}

impl MemoryKeywordIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, tenant_id: Uuid) -> Arc<RwLock<TenantKeywordIndex>> {
        Arc::clone(
            self.indices
                .entry(tenant_id)
                .or_insert_with(|| Arc::new(RwLock::new(TenantKeywordIndex::default())))
                .value(),
        )
    }

    fn index_name(tenant_id: Uuid) -> String {
        format!("tenant-{tenant_id}")
    }
}

impl std::fmt::Debug for MemoryKeywordIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryKeywordIndex").finish_non_exhaustive()
    }
}

#[async_trait]
impl KeywordIndex for MemoryKeywordIndex {
    async fn ensure_index(&self, tenant_id: Uuid) -> Result<String> {
        check_resource_tenant(tenant_id)?;
        let created = !self.indices.contains_key(&tenant_id);
        let _ = self.handle(tenant_id);
        if created {
            info!(tenant_id = %tenant_id, "created keyword index");
        }
        Ok(Self::index_name(tenant_id))
    }

    async fn add_document(&self, doc: KeywordDocument) -> Result<()> {
        check_resource_tenant(doc.tenant_id)?;
        let handle = self.handle(doc.tenant_id);
        debug!(tenant_id = %doc.tenant_id, document_id = %doc.document_id, "indexing document");
        handle.write().index(doc);
        Ok(())
    }

    async fn remove_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        if let Some(handle) = self.indices.get(&tenant_id) {
            handle.write().docs.remove(&document_id);
        }
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        k: usize,
        filter: &KeywordFilter,
    ) -> Result<Vec<(Uuid, f32)>> {
        check_resource_tenant(tenant_id)?;
        if query.trim().is_empty() {
            return Err(RagError::validation_field(
                "query text cannot be empty",
                "query_text",
            ));
        }
        let Some(handle) = self.indices.get(&tenant_id).map(|h| Arc::clone(h.value())) else {
            return Ok(Vec::new());
        };
        let results = handle.read().search(tenant_id, query, k, filter);
        Ok(results)
    }

    async fn delete_index(&self, tenant_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        self.indices.remove(&tenant_id);
        info!(tenant_id = %tenant_id, "deleted keyword index");
        Ok(())
    }

    async fn document_count(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        Ok(self
            .indices
            .get(&tenant_id)
            .map_or(0, |h| h.read().docs.len()))
    }

    async fn export_documents(&self, tenant_id: Uuid) -> Result<Vec<KeywordDocument>> {
        check_resource_tenant(tenant_id)?;
        let Some(handle) = self.indices.get(&tenant_id).map(|h| Arc::clone(h.value())) else {
            return Ok(Vec::new());
        };
        let mut docs: Vec<KeywordDocument> = handle
            .read()
            .docs
            .values()
            .map(|d| d.doc.clone())
            .collect();
        docs.sort_by_key(|d| d.document_id);
        Ok(docs)
    }

    async fn import_documents(&self, tenant_id: Uuid, docs: Vec<KeywordDocument>) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let handle = self.handle(tenant_id);
        let mut index = handle.write();
        for doc in docs {
            if doc.tenant_id != tenant_id {
                return Err(RagError::tenant_isolation(format!(
                    "document {} belongs to tenant {}, not {tenant_id}",
                    doc.document_id, doc.tenant_id
                )));
            }
            index.index(doc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::context::{scope, RequestContext};
    use ragserve_core::model::user::Role;
    use serde_json::json;

    fn ctx(tenant: Uuid) -> RequestContext {
        RequestContext::new()
            .with_tenant(tenant)
            .with_role(Role::ProjectAdmin)
    }

    fn doc(tenant: Uuid, title: &str, content: &str) -> KeywordDocument {
        KeywordDocument {
            document_id: Uuid::new_v4(),
            tenant_id: tenant,
            title: title.to_string(),
            content: content.to_string(),
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn search_ranks_matching_documents_first() {
        let index = MemoryKeywordIndex::new();
        let tenant = Uuid::new_v4();

        scope(ctx(tenant), async {
            index.ensure_index(tenant).await.unwrap();
            let alpha = doc(tenant, "alpha", "alpha alpha alpha report");
            let beta = doc(tenant, "beta", "beta notes mention alpha once");
            let gamma = doc(tenant, "gamma", "entirely unrelated text");
            let alpha_id = alpha.document_id;
            index.add_document(alpha).await.unwrap();
            index.add_document(beta).await.unwrap();
            index.add_document(gamma).await.unwrap();

            let hits = index
                .search(tenant, "alpha", 10, &KeywordFilter::default())
                .await
                .unwrap();
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].0, alpha_id);
            assert!((hits[0].1 - 1.0).abs() < f32::EPSILON);
            assert!(hits[1].1 <= 1.0);
        })
        .await;
    }

    #[tokio::test]
    async fn type_and_tag_filters_apply() {
        let index = MemoryKeywordIndex::new();
        let tenant = Uuid::new_v4();

        scope(ctx(tenant), async {
            let mut report = doc(tenant, "q3 report", "quarterly numbers");
            report.metadata =
                HashMap::from([("type".to_string(), json!("report"))]);
            let mut memo = doc(tenant, "q3 memo", "quarterly summary");
            memo.metadata = HashMap::from([
                ("type".to_string(), json!("memo")),
                ("tags".to_string(), json!(["finance"])),
            ]);
            let report_id = report.document_id;
            let memo_id = memo.document_id;
            index.add_document(report).await.unwrap();
            index.add_document(memo).await.unwrap();

            let filter = KeywordFilter {
                document_type: Some("report".to_string()),
                ..KeywordFilter::default()
            };
            let hits = index.search(tenant, "quarterly", 10, &filter).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].0, report_id);

            let filter = KeywordFilter {
                tags: vec!["finance".to_string()],
                ..KeywordFilter::default()
            };
            let hits = index.search(tenant, "quarterly", 10, &filter).await.unwrap();
            assert_eq!(hits.len(), 1);
            assert_eq!(hits[0].0, memo_id);
        })
        .await;
    }

    #[tokio::test]
    async fn empty_query_is_a_validation_error() {
        let index = MemoryKeywordIndex::new();
        let tenant = Uuid::new_v4();
        scope(ctx(tenant), async {
            let err = index
                .search(tenant, "   ", 10, &KeywordFilter::default())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
        })
        .await;
    }
}

//! `rag_search`: hybrid retrieval with metadata hydration and optional
//! personalization.

use crate::{parse_args, validate_limit, ToolContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragserve_core::context;
use ragserve_core::traits::keyword::KeywordFilter;
use ragserve_core::traits::relational::{DocumentStore, MemoryStore};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

const SNIPPET_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    tenant_id: Option<Uuid>,
    document_type: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    limit: usize,
    session_id: Option<String>,
    #[serde(default)]
    enable_personalization: bool,
    vector_weight: Option<f32>,
    keyword_weight: Option<f32>,
}

const fn default_limit() -> usize {
    10
}

/// `rag_search`
pub struct Search {
    ctx: ToolContext,
}

impl Search {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    fn snippet(title: &str) -> String {
        if title.chars().count() <= SNIPPET_LIMIT {
            title.to_string()
        } else {
            let cut: String = title.chars().take(SNIPPET_LIMIT).collect();
            format!("{cut}…")
        }
    }

    /// Reorder results by the caller's remembered topics. Any failure leaves
    /// the unpersonalized order in place.
    async fn personalize(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        results: &mut [(Uuid, f32, Value)],
    ) -> Result<()> {
        let Some(entry) = self
            .ctx
            .repos
            .memory
            .get(tenant_id, user_id, "preferred_topics")
            .await?
        else {
            return Ok(());
        };
        let topics: Vec<String> = entry
            .value
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str())
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or_default();
        if topics.is_empty() {
            return Ok(());
        }

        results.sort_by(|a, b| {
            let boost = |hydrated: &Value| -> bool {
                let haystack = hydrated.to_string().to_lowercase();
                topics.iter().any(|t| haystack.contains(t))
            };
            boost(&b.2)
                .cmp(&boost(&a.2))
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
        });
        debug!(user_id = %user_id, topics = topics.len(), "personalized result order");
        Ok(())
    }
}

#[async_trait]
impl ToolHandler for Search {
    fn name(&self) -> &'static str {
        "rag_search"
    }

    fn description(&self) -> &'static str {
        "Hybrid search over the tenant knowledge base"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: SearchArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        validate_limit(args.limit)?;

        let filter = KeywordFilter {
            document_type: args.document_type,
            tags: args.tags,
            date_range: match (args.date_from, args.date_to) {
                (Some(from), Some(to)) => Some((from, to)),
                (Some(from), None) => Some((from, Utc::now())),
                _ => None,
            },
        };
        let weights = match (args.vector_weight, args.keyword_weight) {
            (Some(v), Some(k)) => Some((v, k)),
            _ => None,
        };

        let outcome = self
            .ctx
            .hybrid
            .search(tenant_id, &args.query, args.limit, &filter, weights)
            .await?;
        self.ctx.tenants.record_search(tenant_id).await;

        // Hydrate from the relational store; documents that vanished between
        // the index hit and hydration are dropped
        let mut hydrated: Vec<(Uuid, f32, Value)> = Vec::with_capacity(outcome.results.len());
        for (document_id, score) in &outcome.results {
            match self
                .ctx
                .repos
                .documents
                .get_document(tenant_id, *document_id)
                .await?
            {
                Some(doc) if !doc.is_deleted() => {
                    let entry = json!({
                        "document_id": doc.document_id,
                        "score": score,
                        "title": doc.title,
                        "metadata": doc.metadata,
                        "source": doc.metadata.get("source").cloned().unwrap_or(Value::Null),
                        "timestamp": doc.created_at,
                        "snippet": Self::snippet(&doc.title),
                    });
                    hydrated.push((*document_id, *score, entry));
                }
                _ => debug!(document_id = %document_id, "dropping stale search hit"),
            }
        }

        if args.enable_personalization {
            if let Ok(user_id) = context::require_user() {
                if let Err(err) = self.personalize(tenant_id, user_id, &mut hydrated).await {
                    warn!(error = %err, "personalization failed, keeping hybrid order");
                }
            }
        }

        info!(
            tenant_id = %tenant_id,
            mode = outcome.search_mode.as_str(),
            results = hydrated.len(),
            fallback = outcome.fallback_triggered,
            "search completed"
        );
        Ok(json!({
            "results": hydrated.into_iter().map(|(_, _, v)| v).collect::<Vec<Value>>(),
            "search_mode": outcome.search_mode.as_str(),
            "vector_success": outcome.vector_ok,
            "keyword_success": outcome.keyword_ok,
            "fallback_triggered": outcome.fallback_triggered,
            "query": args.query,
            "session_id": args.session_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_titles_with_ellipsis() {
        let short = Search::snippet("alpha");
        assert_eq!(short, "alpha");

        let long_title = "x".repeat(250);
        let snippet = Search::snippet(&long_title);
        assert!(snippet.ends_with('…'));
        assert_eq!(snippet.chars().count(), SNIPPET_LIMIT + 1);
    }
}

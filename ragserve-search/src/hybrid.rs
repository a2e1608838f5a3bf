//! Hybrid search: parallel vector + keyword arms with weighted fusion.
//!
//! Three-tier fallback: both arms healthy fuse into `hybrid`; a single
//! surviving arm serves `vector_only` / `keyword_only` with its scores
//! unchanged; two dead arms yield `failed` with empty results. Arm failures
//! never surface to the caller. Each arm gets an independent wall-clock
//! budget covering everything it does (embedding, backend round-trip, ID
//! resolution); exceeding it counts as arm failure, and the peer arm is not
//! cancelled.

use async_trait::async_trait;
use ragserve_core::context;
use ragserve_core::traits::keyword::KeywordFilter;
use ragserve_core::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Vector arm seam, implemented by `VectorSearchService` and by failure stubs
/// in tests
#[async_trait]
pub trait VectorSearcher: Send + Sync {
    async fn search(&self, tenant_id: Uuid, query: &str, k: usize) -> Result<Vec<(Uuid, f32)>>;
}

/// Keyword arm seam
#[async_trait]
pub trait KeywordSearcher: Send + Sync {
    async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        k: usize,
        filter: &KeywordFilter,
    ) -> Result<Vec<(Uuid, f32)>>;
}

#[async_trait]
impl VectorSearcher for crate::vector::VectorSearchService {
    async fn search(&self, tenant_id: Uuid, query: &str, k: usize) -> Result<Vec<(Uuid, f32)>> {
        Self::search(self, tenant_id, query, k).await
    }
}

#[async_trait]
impl KeywordSearcher for crate::keyword::KeywordSearchService {
    async fn search(
        &self,
        tenant_id: Uuid,
        query: &str,
        k: usize,
        filter: &KeywordFilter,
    ) -> Result<Vec<(Uuid, f32)>> {
        Self::search(self, tenant_id, query, k, filter).await
    }
}

/// Which tier served the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    Hybrid,
    VectorOnly,
    KeywordOnly,
    Failed,
}

impl SearchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::VectorOnly => "vector_only",
            Self::KeywordOnly => "keyword_only",
            Self::Failed => "failed",
        }
    }
}

/// Hybrid search result envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HybridSearchOutcome {
    /// `(document_id, fused_score)`, best first, at most `k`
    pub results: Vec<(Uuid, f32)>,
    pub search_mode: SearchMode,
    pub vector_ok: bool,
    pub keyword_ok: bool,
    pub fallback_triggered: bool,
}

/// Tuning for the hybrid searcher
#[derive(Debug, Clone)]
pub struct HybridConfig {
    /// Per-arm wall-clock budget
    pub arm_timeout: Duration,
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            arm_timeout: Duration::from_millis(500),
            vector_weight: 0.6,
            keyword_weight: 0.4,
        }
    }
}

/// Orchestrates the two arms and fuses their scores
pub struct HybridSearchService {
    vector: Arc<dyn VectorSearcher>,
    keyword: Arc<dyn KeywordSearcher>,
    config: HybridConfig,
}

impl std::fmt::Debug for HybridSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSearchService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HybridSearchService {
    #[must_use]
    pub fn new(
        vector: Arc<dyn VectorSearcher>,
        keyword: Arc<dyn KeywordSearcher>,
        config: HybridConfig,
    ) -> Self {
        Self {
            vector,
            keyword,
            config,
        }
    }

    /// Run the hybrid search. `weights` overrides the configured
    /// `(vector, keyword)` pair for this query.
    pub async fn search(
        &self,
        tenant_id: Uuid,
        query_text: &str,
        k: usize,
        filter: &KeywordFilter,
        weights: Option<(f32, f32)>,
    ) -> Result<HybridSearchOutcome> {
        if query_text.trim().is_empty() {
            return Err(RagError::validation_field(
                "query text cannot be empty",
                "query_text",
            ));
        }

        debug!(
            tenant_id = %tenant_id,
            query_length = query_text.len(),
            k,
            "starting hybrid search"
        );

        let timeout = self.config.arm_timeout;

        // Both arms run concurrently on spawned tasks that inherit the
        // request context. A failed arm resolves to (empty, false); the
        // peer keeps running to its own deadline.
        let vector_arm = {
            let vector = Arc::clone(&self.vector);
            let query = query_text.to_string();
            context::spawn_scoped(async move {
                run_arm("vector", timeout, vector.search(tenant_id, &query, k)).await
            })
        };
        let keyword_arm = {
            let keyword = Arc::clone(&self.keyword);
            let query = query_text.to_string();
            let filter = filter.clone();
            context::spawn_scoped(async move {
                run_arm(
                    "keyword",
                    timeout,
                    keyword.search(tenant_id, &query, k, &filter),
                )
                .await
            })
        };

        let (vector_join, keyword_join) = tokio::join!(vector_arm, keyword_arm);
        let (vector_results, vector_ok) = vector_join.unwrap_or_else(|e| {
            error!(error = %e, "vector arm task failed");
            (Vec::new(), false)
        });
        let (keyword_results, keyword_ok) = keyword_join.unwrap_or_else(|e| {
            error!(error = %e, "keyword arm task failed");
            (Vec::new(), false)
        });

        let (vector_weight, keyword_weight) =
            weights.unwrap_or((self.config.vector_weight, self.config.keyword_weight));

        let outcome = match (vector_ok, keyword_ok) {
            (true, true) => {
                let mut fused = Self::fuse(
                    &vector_results,
                    &keyword_results,
                    vector_weight,
                    keyword_weight,
                );
                fused.truncate(k);
                info!(
                    tenant_id = %tenant_id,
                    vector_results = vector_results.len(),
                    keyword_results = keyword_results.len(),
                    merged = fused.len(),
                    "hybrid search completed with both arms"
                );
                HybridSearchOutcome {
                    results: fused,
                    search_mode: SearchMode::Hybrid,
                    vector_ok,
                    keyword_ok,
                    fallback_triggered: false,
                }
            }
            (true, false) => {
                warn!(tenant_id = %tenant_id, "hybrid fallback: keyword arm failed, vector only");
                let mut results = vector_results;
                results.truncate(k);
                HybridSearchOutcome {
                    results,
                    search_mode: SearchMode::VectorOnly,
                    vector_ok,
                    keyword_ok,
                    fallback_triggered: true,
                }
            }
            (false, true) => {
                warn!(tenant_id = %tenant_id, "hybrid fallback: vector arm failed, keyword only");
                let mut results = keyword_results;
                results.truncate(k);
                HybridSearchOutcome {
                    results,
                    search_mode: SearchMode::KeywordOnly,
                    vector_ok,
                    keyword_ok,
                    fallback_triggered: true,
                }
            }
            (false, false) => {
                error!(tenant_id = %tenant_id, "hybrid search failed: both arms down");
                HybridSearchOutcome {
                    results: Vec::new(),
                    search_mode: SearchMode::Failed,
                    vector_ok,
                    keyword_ok,
                    fallback_triggered: true,
                }
            }
        };
        Ok(outcome)
    }

    /// Weighted fusion over the union of both score maps. Weights are
    /// normalized to sum to one; a document missing from an arm contributes
    /// zero from that arm. Ties preserve vector-arm order, then keyword-arm
    /// order, so equal inputs always produce equal output.
    fn fuse(
        vector_results: &[(Uuid, f32)],
        keyword_results: &[(Uuid, f32)],
        vector_weight: f32,
        keyword_weight: f32,
    ) -> Vec<(Uuid, f32)> {
        let total = vector_weight + keyword_weight;
        let (vector_weight, keyword_weight) = if total > 0.0 {
            (vector_weight / total, keyword_weight / total)
        } else {
            (0.5, 0.5)
        };

        let vector_scores: HashMap<Uuid, f32> = vector_results.iter().copied().collect();
        let keyword_scores: HashMap<Uuid, f32> = keyword_results.iter().copied().collect();
        let vector_rank: HashMap<Uuid, usize> = vector_results
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();
        let keyword_rank: HashMap<Uuid, usize> = keyword_results
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, i))
            .collect();

        let mut all_ids: Vec<Uuid> = vector_results
            .iter()
            .map(|(id, _)| *id)
            .chain(keyword_results.iter().map(|(id, _)| *id))
            .collect();
        all_ids.sort_unstable();
        all_ids.dedup();

        let mut fused: Vec<(Uuid, f32)> = all_ids
            .into_iter()
            .map(|id| {
                let score = vector_scores.get(&id).copied().unwrap_or(0.0) * vector_weight
                    + keyword_scores.get(&id).copied().unwrap_or(0.0) * keyword_weight;
                (id, score)
            })
            .collect();

        fused.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let rank = |id: &Uuid| {
                        (
                            vector_rank.get(id).copied().unwrap_or(usize::MAX),
                            keyword_rank.get(id).copied().unwrap_or(usize::MAX),
                        )
                    };
                    rank(&a.0).cmp(&rank(&b.0))
                })
        });
        fused
    }
}

/// Drive one arm to completion against its deadline. Errors, join failures,
/// and deadline expiry all map to `(empty, false)`.
async fn run_arm<F>(arm: &'static str, timeout: Duration, fut: F) -> (Vec<(Uuid, f32)>, bool)
where
    F: std::future::Future<Output = Result<Vec<(Uuid, f32)>>>,
{
    let started = Instant::now();
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(results)) => {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                warn!(
                    arm,
                    elapsed_ms = elapsed.as_millis() as u64,
                    threshold_ms = timeout.as_millis() as u64,
                    "search arm exceeded timeout threshold"
                );
                (Vec::new(), false)
            } else {
                (results, true)
            }
        }
        Ok(Err(err)) => {
            warn!(arm, error = %err, "search arm failed");
            (Vec::new(), false)
        }
        Err(_) => {
            warn!(
                arm,
                timeout_ms = timeout.as_millis() as u64,
                "search arm timed out"
            );
            (Vec::new(), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedVector(Vec<(Uuid, f32)>);
    struct FixedKeyword(Vec<(Uuid, f32)>);
    struct FailingVector;
    struct FailingKeyword;
    struct SlowKeyword(Duration);

    #[async_trait]
    impl VectorSearcher for FixedVector {
        async fn search(&self, _t: Uuid, _q: &str, k: usize) -> Result<Vec<(Uuid, f32)>> {
            Ok(self.0.iter().take(k).copied().collect())
        }
    }

    #[async_trait]
    impl KeywordSearcher for FixedKeyword {
        async fn search(
            &self,
            _t: Uuid,
            _q: &str,
            k: usize,
            _f: &KeywordFilter,
        ) -> Result<Vec<(Uuid, f32)>> {
            Ok(self.0.iter().take(k).copied().collect())
        }
    }

    #[async_trait]
    impl VectorSearcher for FailingVector {
        async fn search(&self, _t: Uuid, _q: &str, _k: usize) -> Result<Vec<(Uuid, f32)>> {
            Err(RagError::transient("vector index unavailable"))
        }
    }

    #[async_trait]
    impl KeywordSearcher for FailingKeyword {
        async fn search(
            &self,
            _t: Uuid,
            _q: &str,
            _k: usize,
            _f: &KeywordFilter,
        ) -> Result<Vec<(Uuid, f32)>> {
            Err(RagError::transient("keyword engine unavailable"))
        }
    }

    #[async_trait]
    impl KeywordSearcher for SlowKeyword {
        async fn search(
            &self,
            _t: Uuid,
            _q: &str,
            _k: usize,
            _f: &KeywordFilter,
        ) -> Result<Vec<(Uuid, f32)>> {
            tokio::time::sleep(self.0).await;
            Ok(vec![(Uuid::new_v4(), 0.9)])
        }
    }

    fn service(
        vector: Arc<dyn VectorSearcher>,
        keyword: Arc<dyn KeywordSearcher>,
    ) -> HybridSearchService {
        HybridSearchService::new(vector, keyword, HybridConfig::default())
    }

    #[tokio::test]
    async fn both_arms_healthy_fuse_into_hybrid_mode() {
        let shared = Uuid::new_v4();
        let vector_only = Uuid::new_v4();
        let keyword_only = Uuid::new_v4();

        let svc = service(
            Arc::new(FixedVector(vec![(shared, 1.0), (vector_only, 0.5)])),
            Arc::new(FixedKeyword(vec![(shared, 1.0), (keyword_only, 0.5)])),
        );
        let outcome = svc
            .search(Uuid::new_v4(), "alpha beta", 10, &KeywordFilter::default(), None)
            .await
            .unwrap();

        assert_eq!(outcome.search_mode, SearchMode::Hybrid);
        assert!(!outcome.fallback_triggered);
        assert_eq!(outcome.results[0].0, shared);
        assert!((outcome.results[0].1 - 1.0).abs() < 1e-6);
        // 0.6 * 0.5 for the vector-only doc beats 0.4 * 0.5 for keyword-only
        assert_eq!(outcome.results[1].0, vector_only);
        assert_eq!(outcome.results[2].0, keyword_only);
    }

    #[tokio::test]
    async fn keyword_failure_falls_back_to_vector_only() {
        let doc = Uuid::new_v4();
        let svc = service(
            Arc::new(FixedVector(vec![(doc, 0.8)])),
            Arc::new(FailingKeyword),
        );
        let outcome = svc
            .search(Uuid::new_v4(), "alpha", 10, &KeywordFilter::default(), None)
            .await
            .unwrap();

        assert_eq!(outcome.search_mode, SearchMode::VectorOnly);
        assert!(outcome.fallback_triggered);
        assert!(outcome.vector_ok && !outcome.keyword_ok);
        // Vector scores pass through unfused
        assert_eq!(outcome.results, vec![(doc, 0.8)]);
    }

    #[tokio::test]
    async fn vector_failure_falls_back_to_keyword_only() {
        let doc = Uuid::new_v4();
        let svc = service(
            Arc::new(FailingVector),
            Arc::new(FixedKeyword(vec![(doc, 0.7)])),
        );
        let outcome = svc
            .search(Uuid::new_v4(), "alpha", 10, &KeywordFilter::default(), None)
            .await
            .unwrap();

        assert_eq!(outcome.search_mode, SearchMode::KeywordOnly);
        assert!(outcome.fallback_triggered);
        assert_eq!(outcome.results, vec![(doc, 0.7)]);
    }

    #[tokio::test]
    async fn both_failing_yields_failed_mode_without_error() {
        let svc = service(Arc::new(FailingVector), Arc::new(FailingKeyword));
        let outcome = svc
            .search(Uuid::new_v4(), "alpha", 10, &KeywordFilter::default(), None)
            .await
            .unwrap();

        assert_eq!(outcome.search_mode, SearchMode::Failed);
        assert!(outcome.fallback_triggered);
        assert!(outcome.results.is_empty());
    }

    #[tokio::test]
    async fn slow_arm_counts_as_failure() {
        let doc = Uuid::new_v4();
        let svc = HybridSearchService::new(
            Arc::new(FixedVector(vec![(doc, 0.9)])),
            Arc::new(SlowKeyword(Duration::from_millis(80))),
            HybridConfig {
                arm_timeout: Duration::from_millis(20),
                ..HybridConfig::default()
            },
        );
        let outcome = svc
            .search(Uuid::new_v4(), "alpha", 10, &KeywordFilter::default(), None)
            .await
            .unwrap();

        assert_eq!(outcome.search_mode, SearchMode::VectorOnly);
        assert!(outcome.fallback_triggered);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_dispatch() {
        let svc = service(Arc::new(FailingVector), Arc::new(FailingKeyword));
        let err = svc
            .search(Uuid::new_v4(), "  ", 10, &KeywordFilter::default(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn equal_scores_break_ties_by_vector_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let fused = HybridSearchService::fuse(&[(a, 0.5), (b, 0.5)], &[], 0.6, 0.4);
        assert_eq!(fused[0].0, a);
        assert_eq!(fused[1].0, b);

        let fused = HybridSearchService::fuse(&[(b, 0.5), (a, 0.5)], &[], 0.6, 0.4);
        assert_eq!(fused[0].0, b);
    }

    #[tokio::test]
    async fn results_are_truncated_to_k() {
        let docs: Vec<(Uuid, f32)> = (0..20)
            .map(|i| (Uuid::new_v4(), 1.0 - f32::from(i as u8) * 0.01))
            .collect();
        let svc = service(
            Arc::new(FixedVector(docs.clone())),
            Arc::new(FixedKeyword(docs)),
        );
        let outcome = svc
            .search(Uuid::new_v4(), "alpha", 5, &KeywordFilter::default(), None)
            .await
            .unwrap();
        assert_eq!(outcome.results.len(), 5);
    }
}

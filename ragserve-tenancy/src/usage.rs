//! Per-tenant usage metrics, cached in process and folded into analytics.

use serde::{Deserialize, Serialize};

/// Counters a tenant accumulates across requests
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TenantUsageMetrics {
    /// Number of embeddings generated
    pub embeddings_generated: u64,
    /// Number of hybrid searches performed
    pub searches_performed: u64,
    /// Number of documents ingested
    pub documents_indexed: u64,
    /// Object storage consumed in bytes
    pub storage_bytes: u64,
}

impl TenantUsageMetrics {
    pub const fn add_embedding_usage(&mut self) {
        self.embeddings_generated += 1;
    }

    pub const fn add_search_usage(&mut self) {
        self.searches_performed += 1;
    }

    pub const fn add_document_usage(&mut self, storage_bytes: u64) {
        self.documents_indexed += 1;
        self.storage_bytes += storage_bytes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut metrics = TenantUsageMetrics::default();
        metrics.add_embedding_usage();
        metrics.add_search_usage();
        metrics.add_document_usage(2048);
        metrics.add_document_usage(1024);

        assert_eq!(metrics.embeddings_generated, 1);
        assert_eq!(metrics.searches_performed, 1);
        assert_eq!(metrics.documents_indexed, 2);
        assert_eq!(metrics.storage_bytes, 3072);
    }
}

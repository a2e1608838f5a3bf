//! Fire-and-forget audit emission.
//!
//! Records go through a bounded queue drained by a background task so audit
//! writes never extend handler latency. On overflow the record is dropped and
//! a counter bumped; a sink failure is logged and swallowed.

use ragserve_core::model::audit::AuditRecord;
use ragserve_core::traits::relational::AuditStore;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, warn};

const REDACTED: &str = "[REDACTED]";
const RESULT_SUMMARY_LIMIT: usize = 500;

/// Bounded async audit writer
pub struct AuditPipeline {
    sender: mpsc::Sender<AuditRecord>,
    dropped: Arc<AtomicU64>,
}

impl std::fmt::Debug for AuditPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditPipeline")
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AuditPipeline {
    /// Spawn the drain task writing through `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AuditRecord>(capacity.max(1));
        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(err) = store.append(record).await {
                    error!(error = %err, "audit sink write failed");
                }
            }
        });
        Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue without blocking; a full queue drops the record.
    pub fn emit(&self, record: AuditRecord) {
        if let Err(err) = self.sender.try_send(record) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(dropped_total = dropped, error = %err, "audit queue full, record dropped");
        }
    }

    /// Records dropped to overflow since startup
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Replace secret-bearing argument values before they reach the audit log.
#[must_use]
pub fn redact_arguments(args: &Value) -> Value {
    match args {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    let lowered = key.to_lowercase();
                    let is_secret = ["key", "token", "secret", "password", "authorization"]
                        .iter()
                        .any(|marker| lowered.contains(marker));
                    if is_secret {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_arguments(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_arguments).collect()),
        other => other.clone(),
    }
}

/// Result summary bounded to 500 bytes on a char boundary
#[must_use]
pub fn truncate_result(result: &Value) -> String {
    let rendered = result.to_string();
    if rendered.len() <= RESULT_SUMMARY_LIMIT {
        return rendered;
    }
    let mut cut = RESULT_SUMMARY_LIMIT;
    while cut > 0 && !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &rendered[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn secret_arguments_are_redacted_recursively() {
        let args = json!({
            "query": "alpha",
            "api_key": "rsk-secret",
            "nested": {"refresh_token": "abc", "limit": 10}
        });
        let redacted = redact_arguments(&args);
        assert_eq!(redacted["query"], "alpha");
        assert_eq!(redacted["api_key"], REDACTED);
        assert_eq!(redacted["nested"]["refresh_token"], REDACTED);
        assert_eq!(redacted["nested"]["limit"], 10);
    }

    #[test]
    fn result_summary_is_bounded() {
        let big = json!({"content": "x".repeat(2000)});
        let summary = truncate_result(&big);
        assert!(summary.len() <= RESULT_SUMMARY_LIMIT + '…'.len_utf8());
    }

    #[tokio::test]
    async fn overflow_drops_instead_of_blocking() {
        struct SlowStore;
        #[async_trait::async_trait]
        impl AuditStore for SlowStore {
            async fn append(&self, _record: AuditRecord) -> ragserve_core::Result<()> {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                Ok(())
            }
            async fn query(
                &self,
                _query: &ragserve_core::AuditQuery,
            ) -> ragserve_core::Result<(Vec<AuditRecord>, usize)> {
                Ok((Vec::new(), 0))
            }
        }

        let pipeline = AuditPipeline::new(Arc::new(SlowStore), 1);
        for _ in 0..10 {
            pipeline.emit(AuditRecord::new("rag_search", "search"));
        }
        assert!(pipeline.dropped_count() > 0);
    }
}

//! Write-only observability sink

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One trace per tool invocation, emitted by the observability middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTrace {
    pub name: String,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub role: Option<String>,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// External trace consumer. Failures are swallowed by the caller; a sink must
/// never affect handler latency or outcome.
#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record(&self, trace: ToolTrace) -> Result<()>;
}

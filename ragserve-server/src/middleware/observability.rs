//! Observability stage: one trace per tool invocation to an external sink.
//!
//! The sink is write-only and failures are swallowed; the default sink
//! renders traces as structured tracing events, which the external consumer
//! scrapes.

use async_trait::async_trait;
use ragserve_core::traits::sinks::{ToolTrace, TraceSink};
use ragserve_core::Result;
use tracing::info;

/// Sink that emits traces as structured log events
#[derive(Debug, Default)]
pub struct LogTraceSink;

#[async_trait]
impl TraceSink for LogTraceSink {
    async fn record(&self, trace: ToolTrace) -> Result<()> {
        info!(
            trace = true,
            tool = %trace.name,
            tenant_id = ?trace.tenant_id,
            user_id = ?trace.user_id,
            role = ?trace.role,
            duration_ms = trace.duration_ms,
            success = trace.success,
            error = ?trace.error,
            "tool invocation"
        );
        Ok(())
    }
}

/// Sink that discards traces, for tests and trace-disabled deployments
#[derive(Debug, Default)]
pub struct NullTraceSink;

#[async_trait]
impl TraceSink for NullTraceSink {
    async fn record(&self, _trace: ToolTrace) -> Result<()> {
        Ok(())
    }
}

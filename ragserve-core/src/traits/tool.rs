//! Tool handler trait, implemented by every leaf operation

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One named tool. Handlers read tenant and principal from the request
/// context installed by the pipeline, take a JSON argument object, and return
/// a JSON result object. Argument and result field names are stable;
/// evolution is additive only.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Registry name, e.g. `rag_search`
    fn name(&self) -> &'static str;

    /// One-line human description for discovery
    fn description(&self) -> &'static str;

    async fn handle(&self, args: Value) -> Result<Value>;
}

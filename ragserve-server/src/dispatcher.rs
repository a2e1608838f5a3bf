//! Tool dispatcher: name → handler registry, invoked through the pipeline.

use crate::middleware::{AuthMaterial, Pipeline};
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::{RagError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Registry populated once at startup
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.len())
            .finish()
    }
}

impl ToolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        info!(tool = handler.name(), "registered tool");
        self.tools.insert(handler.name(), handler);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.tools.get(name)
    }

    /// `(name, description)` pairs, sorted by name
    #[must_use]
    pub fn catalog(&self) -> Vec<(&'static str, &'static str)> {
        let mut entries: Vec<(&'static str, &'static str)> = self
            .tools
            .values()
            .map(|h| (h.name(), h.description()))
            .collect();
        entries.sort_unstable_by_key(|(name, _)| *name);
        entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Entry point for every tool invocation
pub struct Dispatcher {
    registry: ToolRegistry,
    pipeline: Pipeline,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: ToolRegistry, pipeline: Pipeline) -> Self {
        Self { registry, pipeline }
    }

    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Resolve the handler and run it through the middleware chain. An
    /// unknown tool name is an application-level not-found, never an
    /// authorization error.
    pub async fn dispatch(
        &self,
        tool: &str,
        args: Value,
        material: AuthMaterial,
    ) -> Result<Value> {
        let handler = self
            .registry
            .get(tool)
            .ok_or_else(|| RagError::not_found(format!("unknown tool: {tool}")))?;
        self.pipeline.execute(handler, args, material).await
    }
}

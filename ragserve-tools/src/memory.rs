//! User-scoped memory tools.
//!
//! A caller may only address their own `user_id`; tenant and platform admins
//! may address other users inside the resolved tenant.

use crate::{parse_args, ToolContext};
use async_trait::async_trait;
use ragserve_core::context;
use ragserve_core::model::memory::MemoryEntry;
use ragserve_core::model::user::Role;
use ragserve_core::traits::relational::MemoryStore;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::{RagError, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

/// Resolve which user's memory the call addresses
fn resolve_target_user(param: Option<Uuid>) -> Result<Uuid> {
    let caller = context::require_user()?;
    match param {
        None => Ok(caller),
        Some(target) if target == caller => Ok(target),
        Some(target) => {
            let role = context::require_role()?;
            if matches!(role, Role::UberAdmin | Role::TenantAdmin) {
                Ok(target)
            } else {
                Err(RagError::authorization(
                    "memory access is limited to your own user",
                ))
            }
        }
    }
}

fn render(entry: &MemoryEntry) -> Value {
    json!({
        "key": entry.key,
        "value": entry.value,
        "updated_at": entry.updated_at,
    })
}

#[derive(Debug, Deserialize)]
struct GetMemoryArgs {
    user_id: Option<Uuid>,
    key: Option<String>,
}

/// `mem0_get_user_memory`
pub struct GetUserMemory {
    ctx: ToolContext,
}

impl GetUserMemory {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for GetUserMemory {
    fn name(&self) -> &'static str {
        "mem0_get_user_memory"
    }

    fn description(&self) -> &'static str {
        "Read user-scoped memory entries"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: GetMemoryArgs = parse_args(args)?;
        let tenant_id = context::require_tenant()?;
        let user_id = resolve_target_user(args.user_id)?;

        match args.key {
            Some(key) => {
                let entry = self
                    .ctx
                    .repos
                    .memory
                    .get(tenant_id, user_id, &key)
                    .await?
                    .ok_or_else(|| RagError::not_found(format!("memory key {key} not found")))?;
                Ok(json!({ "user_id": user_id, "memory": render(&entry) }))
            }
            None => {
                let entries = self.ctx.repos.memory.list(tenant_id, user_id).await?;
                Ok(json!({
                    "user_id": user_id,
                    "memories": entries.iter().map(render).collect::<Vec<Value>>(),
                    "total": entries.len(),
                }))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpdateMemoryArgs {
    key: String,
    value: Value,
    user_id: Option<Uuid>,
}

/// `mem0_update_memory`: a `null` value clears the slot
pub struct UpdateMemory {
    ctx: ToolContext,
}

impl UpdateMemory {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for UpdateMemory {
    fn name(&self) -> &'static str {
        "mem0_update_memory"
    }

    fn description(&self) -> &'static str {
        "Write or clear a user memory entry"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: UpdateMemoryArgs = parse_args(args)?;
        let tenant_id = context::require_tenant()?;
        let user_id = resolve_target_user(args.user_id)?;

        if args.key.trim().is_empty() {
            return Err(RagError::validation_field("key cannot be empty", "key"));
        }

        if args.value.is_null() {
            let removed = self
                .ctx
                .repos
                .memory
                .delete(tenant_id, user_id, &args.key)
                .await?;
            return Ok(json!({
                "user_id": user_id,
                "key": args.key,
                "status": if removed { "deleted" } else { "not_found" },
            }));
        }

        self.ctx
            .repos
            .memory
            .put(MemoryEntry::new(tenant_id, user_id, args.key.clone(), args.value))
            .await?;
        Ok(json!({ "user_id": user_id, "key": args.key, "status": "updated" }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchMemoryArgs {
    query: String,
    user_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    limit: usize,
}

const fn default_limit() -> usize {
    10
}

/// `mem0_search_memory`
pub struct SearchMemory {
    ctx: ToolContext,
}

impl SearchMemory {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for SearchMemory {
    fn name(&self) -> &'static str {
        "mem0_search_memory"
    }

    fn description(&self) -> &'static str {
        "Search user-scoped memory"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: SearchMemoryArgs = parse_args(args)?;
        let tenant_id = context::require_tenant()?;
        let user_id = resolve_target_user(args.user_id)?;
        crate::validate_limit(args.limit)?;

        if args.query.trim().is_empty() {
            return Err(RagError::validation_field(
                "query cannot be empty",
                "query",
            ));
        }

        let entries = self
            .ctx
            .repos
            .memory
            .search(tenant_id, user_id, &args.query, args.limit)
            .await?;
        Ok(json!({
            "user_id": user_id,
            "memories": entries.iter().map(render).collect::<Vec<Value>>(),
            "total": entries.len(),
        }))
    }
}

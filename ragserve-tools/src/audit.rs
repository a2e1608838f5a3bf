//! `rag_query_audit_logs`: filtered, paginated audit log access.

use crate::{parse_args, validate_limit, ToolContext};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ragserve_core::context;
use ragserve_core::model::audit::AuditQuery;
use ragserve_core::traits::relational::AuditStore;
use ragserve_core::traits::tool::ToolHandler;
use ragserve_core::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct QueryAuditArgs {
    tenant_id: Option<Uuid>,
    action: Option<String>,
    user_id: Option<Uuid>,
    success: Option<bool>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    offset: usize,
}

const fn default_limit() -> usize {
    50
}

/// `rag_query_audit_logs`
pub struct QueryAuditLogs {
    ctx: ToolContext,
}

impl QueryAuditLogs {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ToolHandler for QueryAuditLogs {
    fn name(&self) -> &'static str {
        "rag_query_audit_logs"
    }

    fn description(&self) -> &'static str {
        "Query the tenant audit log"
    }

    async fn handle(&self, args: Value) -> Result<Value> {
        let args: QueryAuditArgs = parse_args(args)?;
        let tenant_id = context::effective_tenant(args.tenant_id)?;
        validate_limit(args.limit)?;

        let query = AuditQuery {
            tenant_id: Some(tenant_id),
            user_id: args.user_id,
            action: args.action,
            action_prefix: None,
            success: args.success,
            from: args.start_date,
            to: args.end_date,
            limit: args.limit,
            offset: args.offset,
        };
        let (records, total) = self.ctx.repos.audit.query(&query).await?;

        let rendered: Vec<Value> = records
            .iter()
            .map(|r| {
                json!({
                    "log_id": r.log_id,
                    "tenant_id": r.tenant_id,
                    "user_id": r.user_id,
                    "action": r.action,
                    "resource_type": r.resource_type,
                    "resource_id": r.resource_id,
                    "details": r.details,
                    "timestamp": r.timestamp,
                })
            })
            .collect();
        Ok(json!({
            "logs": rendered,
            "total": total,
            "limit": args.limit,
            "offset": args.offset,
        }))
    }
}

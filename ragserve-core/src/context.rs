//! ABOUTME: Request-scoped context for tenant, user, and auth propagation
//! ABOUTME: Task-local storage with explicit propagation across spawn points

use crate::error::{RagError, Result};
use crate::model::user::{AuthMethod, Role};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::task::JoinHandle;
use uuid::Uuid;

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

/// Ambient per-request values, populated by the middleware pipeline and read
/// by tool handlers and backend adapters.
///
/// Fields fill in as the pipeline advances: authentication sets `user_id`,
/// `role`, and `auth_method`; tenant extraction sets `tenant_id`. A component
/// touching a tenant-scoped resource must read the tenant from here, never
/// from a caller-supplied parameter alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    /// Tenant the request operates on
    pub tenant_id: Option<Uuid>,

    /// Authenticated principal
    pub user_id: Option<Uuid>,

    /// Role resolved during authentication
    pub role: Option<Role>,

    /// How the principal authenticated
    pub auth_method: Option<AuthMethod>,

    /// Client session identifier, if supplied
    pub session_id: Option<String>,

    /// Source IP address
    pub ip_address: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    #[must_use]
    pub fn with_auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = Some(ip.into());
        self
    }

    /// Whether the principal holds the platform-wide admin role
    #[must_use]
    pub fn is_uber_admin(&self) -> bool {
        self.role == Some(Role::UberAdmin)
    }
}

/// Run a future with `ctx` installed as the ambient request context.
pub async fn scope<F>(ctx: RequestContext, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_CONTEXT.scope(ctx, fut).await
}

/// Snapshot of the ambient context, if one is installed.
#[must_use]
pub fn current() -> Option<RequestContext> {
    REQUEST_CONTEXT.try_with(Clone::clone).ok()
}

/// Spawn a task that inherits the current request context.
///
/// Propagation across spawn points is mandatory for tenant isolation; plain
/// `tokio::spawn` loses the task-local and is wrong for any work that touches
/// a tenant-scoped backend.
pub fn spawn_scoped<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let ctx = current().unwrap_or_default();
    tokio::spawn(REQUEST_CONTEXT.scope(ctx, fut))
}

/// Tenant from the ambient context, or a tenant-isolation error.
pub fn require_tenant() -> Result<Uuid> {
    current()
        .and_then(|c| c.tenant_id)
        .ok_or_else(|| RagError::tenant_isolation("no tenant in request context"))
}

/// Principal from the ambient context, or an authentication error.
pub fn require_user() -> Result<Uuid> {
    current()
        .and_then(|c| c.user_id)
        .ok_or_else(|| RagError::authentication("no authenticated user in request context"))
}

/// Role from the ambient context, or an authentication error.
pub fn require_role() -> Result<Role> {
    current()
        .and_then(|c| c.role)
        .ok_or_else(|| RagError::authentication("no role in request context"))
}

/// Resolve the tenant a tool invocation operates on.
///
/// With no explicit parameter the context tenant is used. An explicit
/// parameter must equal the context tenant unless the caller is `uber_admin`,
/// who may address any tenant.
pub fn effective_tenant(param: Option<Uuid>) -> Result<Uuid> {
    let ctx_tenant = require_tenant()?;
    match param {
        None => Ok(ctx_tenant),
        Some(requested) if requested == ctx_tenant => Ok(requested),
        Some(requested) => {
            if current().is_some_and(|c| c.is_uber_admin()) {
                Ok(requested)
            } else {
                Err(RagError::authorization(format!(
                    "cross-tenant access denied: tenant {requested} does not match request tenant"
                )))
            }
        }
    }
}

/// Adapter-side guard: the tenant embedded in a backend resource must match
/// the request context (`uber_admin` exempt).
pub fn check_resource_tenant(resource_tenant: Uuid) -> Result<()> {
    let ctx = current().unwrap_or_default();
    if ctx.is_uber_admin() {
        return Ok(());
    }
    match ctx.tenant_id {
        Some(t) if t == resource_tenant => Ok(()),
        Some(t) => Err(RagError::tenant_isolation(format!(
            "tenant mismatch: resource belongs to {resource_tenant}, request context is {t}"
        ))),
        None => Err(RagError::tenant_isolation(
            "tenant-scoped resource accessed without tenant context",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_is_scoped_and_propagates_to_spawned_tasks() {
        let tenant = Uuid::new_v4();
        let ctx = RequestContext::new()
            .with_tenant(tenant)
            .with_role(Role::EndUser);

        scope(ctx, async move {
            assert_eq!(require_tenant().unwrap(), tenant);

            let handle = spawn_scoped(async move { require_tenant().unwrap() });
            assert_eq!(handle.await.unwrap(), tenant);
        })
        .await;

        assert!(current().is_none());
    }

    #[tokio::test]
    async fn effective_tenant_enforces_cross_tenant_rule() {
        let own = Uuid::new_v4();
        let foreign = Uuid::new_v4();

        let admin_ctx = RequestContext::new()
            .with_tenant(own)
            .with_role(Role::TenantAdmin);
        scope(admin_ctx, async move {
            assert_eq!(effective_tenant(None).unwrap(), own);
            assert_eq!(effective_tenant(Some(own)).unwrap(), own);
            let err = effective_tenant(Some(foreign)).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Authorization);
        })
        .await;

        let uber_ctx = RequestContext::new()
            .with_tenant(own)
            .with_role(Role::UberAdmin);
        scope(uber_ctx, async move {
            assert_eq!(effective_tenant(Some(foreign)).unwrap(), foreign);
        })
        .await;
    }

    #[tokio::test]
    async fn resource_tenant_check_rejects_mismatch() {
        let own = Uuid::new_v4();
        let foreign = Uuid::new_v4();
        let ctx = RequestContext::new()
            .with_tenant(own)
            .with_role(Role::EndUser);

        scope(ctx, async move {
            assert!(check_resource_tenant(own).is_ok());
            let err = check_resource_tenant(foreign).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::TenantIsolation);
        })
        .await;
    }
}

//! PostgreSQL relational adapter with row-level security.
//!
//! Every operation runs in its own transaction. On open the adapter publishes
//! the request context through `set_config('app.current_tenant_id', …, true)`
//! and `app.current_role`, so database-level RLS predicates filter rows by
//! tenant. The expected schema:
//!
//! ```sql
//! CREATE TABLE tenants (
//!     tenant_id  UUID PRIMARY KEY,
//!     name       TEXT NOT NULL,
//!     domain     TEXT,
//!     tier       TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL,
//!     deleted_at TIMESTAMPTZ
//! );
//! CREATE TABLE tenant_configs   (tenant_id UUID PRIMARY KEY, config JSONB NOT NULL);
//! CREATE TABLE templates        (name TEXT PRIMARY KEY, template JSONB NOT NULL);
//! CREATE TABLE users (
//!     user_id    UUID PRIMARY KEY,
//!     tenant_id  UUID NOT NULL,
//!     email      TEXT NOT NULL UNIQUE,
//!     role       TEXT NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL
//! );
//! CREATE TABLE documents (
//!     document_id    UUID PRIMARY KEY,
//!     tenant_id      UUID NOT NULL,
//!     user_id        UUID NOT NULL,
//!     title          TEXT NOT NULL,
//!     content_hash   TEXT NOT NULL,
//!     metadata       JSONB NOT NULL,
//!     version_number INT NOT NULL,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL,
//!     deleted_at     TIMESTAMPTZ
//! );
//! CREATE TABLE document_versions (version_id UUID PRIMARY KEY, tenant_id UUID NOT NULL,
//!     document_id UUID NOT NULL, version JSONB NOT NULL);
//! CREATE TABLE audit_logs (log_id UUID PRIMARY KEY, tenant_id UUID, record JSONB NOT NULL,
//!     ts TIMESTAMPTZ NOT NULL);
//! CREATE TABLE tenant_api_keys (key_id UUID PRIMARY KEY, tenant_id UUID NOT NULL,
//!     key JSONB NOT NULL);
//! CREATE TABLE user_memory (tenant_id UUID NOT NULL, user_id UUID NOT NULL,
//!     key TEXT NOT NULL, entry JSONB NOT NULL, PRIMARY KEY (tenant_id, user_id, key));
//! ```
//!
//! Documents, versions, audit, API keys, and memory carry RLS policies keyed
//! on `current_setting('app.current_tenant_id', true)`.

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, Pool, Runtime};
use ragserve_core::context::{self, check_resource_tenant};
use ragserve_core::model::api_key::TenantApiKey;
use ragserve_core::model::audit::{AuditQuery, AuditRecord};
use ragserve_core::model::document::{Document, DocumentVersion};
use ragserve_core::model::memory::MemoryEntry;
use ragserve_core::model::template::Template;
use ragserve_core::model::tenant::{Tenant, TenantConfiguration};
use ragserve_core::model::user::User;
use ragserve_core::traits::relational::{
    ApiKeyStore, AuditStore, DocumentFilter, DocumentStore, MemoryStore, Repositories,
    TemplateStore, TenantStore, UserStore,
};
use ragserve_core::{RagError, Result, Role};
use std::str::FromStr;
use std::sync::Arc;
use tokio_postgres::{NoTls, Row, Transaction};
use uuid::Uuid;

fn transient(e: impl std::fmt::Display) -> RagError {
    RagError::transient(format!("postgres: {e}"))
}

fn internal(e: impl std::fmt::Display) -> RagError {
    RagError::internal(format!("postgres: {e}"))
}

/// RLS-backed relational store
pub struct PostgresRelational {
    pool: Pool,
}

impl std::fmt::Debug for PostgresRelational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRelational").finish_non_exhaustive()
    }
}

impl PostgresRelational {
    /// Connect a pool to `url` with at most `pool_size` sessions.
    pub fn connect(url: &str, pool_size: usize) -> Result<Arc<Self>> {
        let mut config = PoolConfig::new();
        config.url = Some(url.to_string());
        config.pool = Some(deadpool_postgres::PoolConfig::new(pool_size));
        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(internal)?;
        Ok(Arc::new(Self { pool }))
    }

    /// Repository bundle backed by this store
    #[must_use]
    pub fn repositories(self: &Arc<Self>) -> Repositories {
        Repositories {
            tenants: self.clone(),
            templates: self.clone(),
            users: self.clone(),
            documents: self.clone(),
            audit: self.clone(),
            api_keys: self.clone(),
            memory: self.clone(),
        }
    }

    /// Publish the request context as RLS session variables, scoped to the
    /// current transaction.
    async fn apply_session(tx: &Transaction<'_>) -> Result<()> {
        let ctx = context::current().unwrap_or_default();
        let tenant = ctx.tenant_id.map(|t| t.to_string()).unwrap_or_default();
        let role = ctx
            .role
            .map(|r| r.as_str().to_string())
            .unwrap_or_default();
        tx.execute(
            "SELECT set_config('app.current_tenant_id', $1, true), \
                    set_config('app.current_role', $2, true)",
            &[&tenant, &role],
        )
        .await
        .map_err(transient)?;
        Ok(())
    }

    fn tenant_from_row(row: &Row) -> Result<Tenant> {
        Ok(Tenant {
            tenant_id: row.try_get("tenant_id").map_err(internal)?,
            name: row.try_get("name").map_err(internal)?,
            domain: row.try_get("domain").map_err(internal)?,
            tier: row
                .try_get::<_, String>("tier")
                .map_err(internal)?
                .parse()
                .map_err(|_| RagError::internal("invalid tier in tenants row"))?,
            created_at: row.try_get("created_at").map_err(internal)?,
            updated_at: row.try_get("updated_at").map_err(internal)?,
            deleted_at: row.try_get("deleted_at").map_err(internal)?,
        })
    }

    fn user_from_row(row: &Row) -> Result<User> {
        let role: String = row.try_get("role").map_err(internal)?;
        Ok(User {
            user_id: row.try_get("user_id").map_err(internal)?,
            tenant_id: row.try_get("tenant_id").map_err(internal)?,
            email: row.try_get("email").map_err(internal)?,
            role: Role::from_str(&role)?,
            created_at: row.try_get("created_at").map_err(internal)?,
        })
    }

    fn document_from_row(row: &Row) -> Result<Document> {
        let metadata: serde_json::Value = row.try_get("metadata").map_err(internal)?;
        let version: i32 = row.try_get("version_number").map_err(internal)?;
        Ok(Document {
            document_id: row.try_get("document_id").map_err(internal)?,
            tenant_id: row.try_get("tenant_id").map_err(internal)?,
            user_id: row.try_get("user_id").map_err(internal)?,
            title: row.try_get("title").map_err(internal)?,
            content_hash: row.try_get("content_hash").map_err(internal)?,
            metadata: serde_json::from_value(metadata).map_err(internal)?,
            version_number: u32::try_from(version).map_err(internal)?,
            created_at: row.try_get("created_at").map_err(internal)?,
            updated_at: row.try_get("updated_at").map_err(internal)?,
            deleted_at: row.try_get("deleted_at").map_err(internal)?,
        })
    }

    fn json_column<T: serde::de::DeserializeOwned>(row: &Row, column: &str) -> Result<T> {
        let value: serde_json::Value = row.try_get(column).map_err(internal)?;
        serde_json::from_value(value).map_err(internal)
    }
}

#[async_trait]
impl TenantStore for PostgresRelational {
    async fn insert_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let conflict = tx
            .query_opt(
                "SELECT 1 FROM tenants WHERE deleted_at IS NULL \
                 AND (name = $1 OR (domain IS NOT NULL AND domain = $2))",
                &[&tenant.name, &tenant.domain],
            )
            .await
            .map_err(transient)?;
        if conflict.is_some() {
            return Err(RagError::conflict(format!(
                "tenant {} already exists",
                tenant.name
            )));
        }
        tx.execute(
            "INSERT INTO tenants \
             (tenant_id, name, domain, tier, created_at, updated_at, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &tenant.tenant_id,
                &tenant.name,
                &tenant.domain,
                &tenant.tier.as_str(),
                &tenant.created_at,
                &tenant.updated_at,
                &tenant.deleted_at,
            ],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get_tenant(&self, tenant_id: Uuid) -> Result<Option<Tenant>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt("SELECT * FROM tenants WHERE tenant_id = $1", &[&tenant_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::tenant_from_row(&r)).transpose()
    }

    async fn get_tenant_by_name(&self, name: &str) -> Result<Option<Tenant>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt("SELECT * FROM tenants WHERE name = $1", &[&name])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::tenant_from_row(&r)).transpose()
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query("SELECT * FROM tenants ORDER BY created_at", &[])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(Self::tenant_from_row).collect()
    }

    async fn update_tenant(&self, tenant: Tenant) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let updated = tx
            .execute(
                "UPDATE tenants SET name = $2, domain = $3, tier = $4, \
                 updated_at = $5, deleted_at = $6 WHERE tenant_id = $1",
                &[
                    &tenant.tenant_id,
                    &tenant.name,
                    &tenant.domain,
                    &tenant.tier.as_str(),
                    &tenant.updated_at,
                    &tenant.deleted_at,
                ],
            )
            .await
            .map_err(transient)?;
        if updated == 0 {
            return Err(RagError::not_found(format!(
                "tenant {} not found",
                tenant.tenant_id
            )));
        }
        tx.commit().await.map_err(transient)
    }

    async fn remove_tenant(&self, tenant_id: Uuid) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        tx.execute(
            "DELETE FROM tenant_configs WHERE tenant_id = $1",
            &[&tenant_id],
        )
        .await
        .map_err(transient)?;
        tx.execute("DELETE FROM tenants WHERE tenant_id = $1", &[&tenant_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn insert_config(&self, config: TenantConfiguration) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&config).map_err(internal)?;
        tx.execute(
            "INSERT INTO tenant_configs (tenant_id, config) VALUES ($1, $2) \
             ON CONFLICT (tenant_id) DO UPDATE SET config = EXCLUDED.config",
            &[&config.tenant_id, &json],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get_config(&self, tenant_id: Uuid) -> Result<Option<TenantConfiguration>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt(
                "SELECT config FROM tenant_configs WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::json_column(&r, "config")).transpose()
    }

    async fn update_config(&self, config: TenantConfiguration) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&config).map_err(internal)?;
        let updated = tx
            .execute(
                "UPDATE tenant_configs SET config = $2 WHERE tenant_id = $1",
                &[&config.tenant_id, &json],
            )
            .await
            .map_err(transient)?;
        if updated == 0 {
            return Err(RagError::not_found(format!(
                "configuration for tenant {} not found",
                config.tenant_id
            )));
        }
        tx.commit().await.map_err(transient)
    }
}

#[async_trait]
impl TemplateStore for PostgresRelational {
    async fn upsert_template(&self, template: Template) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&template).map_err(internal)?;
        tx.execute(
            "INSERT INTO templates (name, template) VALUES ($1, $2) \
             ON CONFLICT (name) DO UPDATE SET template = EXCLUDED.template",
            &[&template.name, &json],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get_template(&self, name: &str) -> Result<Option<Template>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt("SELECT template FROM templates WHERE name = $1", &[&name])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::json_column(&r, "template")).transpose()
    }

    async fn list_templates(&self) -> Result<Vec<Template>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query("SELECT template FROM templates ORDER BY name", &[])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(|r| Self::json_column(r, "template")).collect()
    }
}

#[async_trait]
impl UserStore for PostgresRelational {
    async fn insert_user(&self, user: User) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let exists = tx
            .query_opt("SELECT 1 FROM users WHERE email = $1", &[&user.email])
            .await
            .map_err(transient)?;
        if exists.is_some() {
            return Err(RagError::conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        tx.execute(
            "INSERT INTO users (user_id, tenant_id, email, role, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &user.user_id,
                &user.tenant_id,
                &user.email,
                &user.role.as_str(),
                &user.created_at,
            ],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt("SELECT * FROM users WHERE user_id = $1", &[&user_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::user_from_row(&r)).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt("SELECT * FROM users WHERE email = $1", &[&email])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::user_from_row(&r)).transpose()
    }

    async fn list_users(&self, tenant_id: Uuid) -> Result<Vec<User>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT * FROM users WHERE tenant_id = $1 ORDER BY created_at",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(Self::user_from_row).collect()
    }

    async fn remove_users_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let removed = tx
            .execute("DELETE FROM users WHERE tenant_id = $1", &[&tenant_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }
}

#[async_trait]
impl DocumentStore for PostgresRelational {
    async fn insert_document(&self, document: Document) -> Result<()> {
        check_resource_tenant(document.tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let metadata = serde_json::to_value(&document.metadata).map_err(internal)?;
        let version = i32::try_from(document.version_number).map_err(internal)?;
        tx.execute(
            "INSERT INTO documents (document_id, tenant_id, user_id, title, \
             content_hash, metadata, version_number, created_at, updated_at, deleted_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            &[
                &document.document_id,
                &document.tenant_id,
                &document.user_id,
                &document.title,
                &document.content_hash,
                &metadata,
                &version,
                &document.created_at,
                &document.updated_at,
                &document.deleted_at,
            ],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get_document(&self, tenant_id: Uuid, document_id: Uuid) -> Result<Option<Document>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt(
                "SELECT * FROM documents WHERE tenant_id = $1 AND document_id = $2",
                &[&tenant_id, &document_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::document_from_row(&r)).transpose()
    }

    async fn find_by_hash(&self, tenant_id: Uuid, content_hash: &str) -> Result<Option<Document>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt(
                "SELECT * FROM documents WHERE tenant_id = $1 AND content_hash = $2 \
                 AND deleted_at IS NULL",
                &[&tenant_id, &content_hash],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::document_from_row(&r)).transpose()
    }

    async fn list_documents(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Document>, usize)> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        // Tenant and tombstone predicates in SQL, metadata predicates in
        // process so jsonb filter shapes stay in one place
        let rows = tx
            .query(
                "SELECT * FROM documents WHERE tenant_id = $1 AND deleted_at IS NULL \
                 ORDER BY created_at DESC",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        let matching: Vec<Document> = rows
            .iter()
            .map(Self::document_from_row)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect();
        let total = matching.len();
        let page = matching.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }

    async fn enumerate_documents(&self, tenant_id: Uuid) -> Result<Vec<Document>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT * FROM documents WHERE tenant_id = $1 AND deleted_at IS NULL",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(Self::document_from_row).collect()
    }

    async fn update_document(&self, document: Document) -> Result<()> {
        check_resource_tenant(document.tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let metadata = serde_json::to_value(&document.metadata).map_err(internal)?;
        let version = i32::try_from(document.version_number).map_err(internal)?;
        let updated = tx
            .execute(
                "UPDATE documents SET title = $3, content_hash = $4, metadata = $5, \
                 version_number = $6, updated_at = $7, deleted_at = $8 \
                 WHERE tenant_id = $1 AND document_id = $2",
                &[
                    &document.tenant_id,
                    &document.document_id,
                    &document.title,
                    &document.content_hash,
                    &metadata,
                    &version,
                    &document.updated_at,
                    &document.deleted_at,
                ],
            )
            .await
            .map_err(transient)?;
        if updated == 0 {
            return Err(RagError::not_found(format!(
                "document {} not found",
                document.document_id
            )));
        }
        tx.commit().await.map_err(transient)
    }

    async fn count_documents(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_one(
                "SELECT COUNT(*) FROM documents WHERE tenant_id = $1 AND deleted_at IS NULL",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        let count: i64 = row.try_get(0).map_err(internal)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn remove_documents_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        tx.execute(
            "DELETE FROM document_versions WHERE tenant_id = $1",
            &[&tenant_id],
        )
        .await
        .map_err(transient)?;
        let removed = tx
            .execute("DELETE FROM documents WHERE tenant_id = $1", &[&tenant_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }

    async fn insert_version(&self, version: DocumentVersion) -> Result<()> {
        check_resource_tenant(version.tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&version).map_err(internal)?;
        tx.execute(
            "INSERT INTO document_versions (version_id, tenant_id, document_id, version) \
             VALUES ($1, $2, $3, $4)",
            &[
                &version.version_id,
                &version.tenant_id,
                &version.document_id,
                &json,
            ],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn list_versions(
        &self,
        tenant_id: Uuid,
        document_id: Uuid,
    ) -> Result<Vec<DocumentVersion>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT version FROM document_versions \
                 WHERE tenant_id = $1 AND document_id = $2",
                &[&tenant_id, &document_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        let mut versions: Vec<DocumentVersion> = rows
            .iter()
            .map(|r| Self::json_column(r, "version"))
            .collect::<Result<Vec<_>>>()?;
        versions.sort_by_key(|v| v.version_number);
        Ok(versions)
    }
}

#[async_trait]
impl AuditStore for PostgresRelational {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&record).map_err(internal)?;
        tx.execute(
            "INSERT INTO audit_logs (log_id, tenant_id, record, ts) VALUES ($1, $2, $3, $4)",
            &[&record.log_id, &record.tenant_id, &json, &record.timestamp],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn query(&self, query: &AuditQuery) -> Result<(Vec<AuditRecord>, usize)> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = match query.tenant_id {
            Some(tenant_id) => {
                tx.query(
                    "SELECT record FROM audit_logs WHERE tenant_id = $1 ORDER BY ts DESC",
                    &[&tenant_id],
                )
                .await
            }
            None => {
                tx.query("SELECT record FROM audit_logs ORDER BY ts DESC", &[])
                    .await
            }
        }
        .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        let matching: Vec<AuditRecord> = rows
            .iter()
            .map(|r| Self::json_column(r, "record"))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .filter(|r| query.matches(r))
            .collect();
        let total = matching.len();
        let limit = if query.limit == 0 { total } else { query.limit };
        let page = matching
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl ApiKeyStore for PostgresRelational {
    async fn insert_key(&self, key: TenantApiKey) -> Result<()> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&key).map_err(internal)?;
        tx.execute(
            "INSERT INTO tenant_api_keys (key_id, tenant_id, key) VALUES ($1, $2, $3)",
            &[&key.key_id, &key.tenant_id, &json],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn all_keys(&self) -> Result<Vec<TenantApiKey>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query("SELECT key FROM tenant_api_keys", &[])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(|r| Self::json_column(r, "key")).collect()
    }

    async fn list_keys(&self, tenant_id: Uuid) -> Result<Vec<TenantApiKey>> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT key FROM tenant_api_keys WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(|r| Self::json_column(r, "key")).collect()
    }

    async fn remove_keys_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let removed = tx
            .execute(
                "DELETE FROM tenant_api_keys WHERE tenant_id = $1",
                &[&tenant_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }
}

#[async_trait]
impl MemoryStore for PostgresRelational {
    async fn put(&self, entry: MemoryEntry) -> Result<()> {
        check_resource_tenant(entry.tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let json = serde_json::to_value(&entry).map_err(internal)?;
        tx.execute(
            "INSERT INTO user_memory (tenant_id, user_id, key, entry) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id, user_id, key) DO UPDATE SET entry = EXCLUDED.entry",
            &[&entry.tenant_id, &entry.user_id, &entry.key, &json],
        )
        .await
        .map_err(transient)?;
        tx.commit().await.map_err(transient)
    }

    async fn get(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<Option<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let row = tx
            .query_opt(
                "SELECT entry FROM user_memory \
                 WHERE tenant_id = $1 AND user_id = $2 AND key = $3",
                &[&tenant_id, &user_id, &key],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        row.map(|r| Self::json_column(&r, "entry")).transpose()
    }

    async fn delete(&self, tenant_id: Uuid, user_id: Uuid, key: &str) -> Result<bool> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let removed = tx
            .execute(
                "DELETE FROM user_memory WHERE tenant_id = $1 AND user_id = $2 AND key = $3",
                &[&tenant_id, &user_id, &key],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        Ok(removed > 0)
    }

    async fn list(&self, tenant_id: Uuid, user_id: Uuid) -> Result<Vec<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT entry FROM user_memory \
                 WHERE tenant_id = $1 AND user_id = $2 ORDER BY key",
                &[&tenant_id, &user_id],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(|r| Self::json_column(r, "entry")).collect()
    }

    async fn search(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>> {
        check_resource_tenant(tenant_id)?;
        let pattern = format!("%{}%", query.to_lowercase());
        let limit_i64 = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let rows = tx
            .query(
                "SELECT entry FROM user_memory \
                 WHERE tenant_id = $1 AND user_id = $2 \
                 AND (LOWER(key) LIKE $3 OR LOWER(entry::text) LIKE $3) \
                 ORDER BY key LIMIT $4",
                &[&tenant_id, &user_id, &pattern, &limit_i64],
            )
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        rows.iter().map(|r| Self::json_column(r, "entry")).collect()
    }

    async fn remove_for_tenant(&self, tenant_id: Uuid) -> Result<usize> {
        let mut client = self.pool.get().await.map_err(transient)?;
        let tx = client.transaction().await.map_err(transient)?;
        Self::apply_session(&tx).await?;
        let removed = tx
            .execute("DELETE FROM user_memory WHERE tenant_id = $1", &[&tenant_id])
            .await
            .map_err(transient)?;
        tx.commit().await.map_err(transient)?;
        Ok(usize::try_from(removed).unwrap_or(0))
    }
}

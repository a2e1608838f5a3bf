//! ABOUTME: Shared test harness for ragserve
//! ABOUTME: Embedded platform with seeded tenants, users, and credentials

use ragserve_config::RagserveConfig;
use ragserve_core::model::api_key::TenantApiKey;
use ragserve_core::model::user::{Role, User};
use ragserve_core::traits::relational::{ApiKeyStore, UserStore};
use ragserve_core::{RagError, Result};
use ragserve_server::middleware::AuthMaterial;
use ragserve_server::{Platform, PlatformOptions};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

/// One fully assembled platform over temp-dir backends, with a seeded
/// enterprise tenant and one credential per role.
pub struct TestPlatform {
    pub platform: Platform,
    /// The seeded tenant
    pub tenant_id: Uuid,
    /// `uber_admin` bootstrap key (platform tenant)
    pub uber_key: String,
    /// `tenant_admin` of the seeded tenant
    pub admin_key: String,
    /// `project_admin` of the seeded tenant
    pub project_key: String,
    /// `end_user` of the seeded tenant
    pub end_user_key: String,
    pub end_user_id: Uuid,
    _dir: TempDir,
}

impl TestPlatform {
    /// Build the platform, seed templates, bootstrap the admin, and register
    /// the `acme` tenant with one user per role.
    pub async fn new() -> Result<Self> {
        let dir = tempfile::tempdir()
            .map_err(|e| RagError::internal(format!("cannot create temp dir: {e}")))?;
        let mut config = RagserveConfig::default();
        config.backends.vector_index_root = dir.path().join("indices");
        config.backends.vector_index_fallback_root = dir.path().join("indices-fallback");
        config.backends.object_store_root = dir.path().join("objects");
        config.backends.backup_root = dir.path().join("backups");
        config.auth.jwt_secret = "test-secret".to_string();

        let platform = Platform::build(PlatformOptions::new(config))?;
        platform.seed().await?;
        let uber_key = platform
            .bootstrap_admin("root@platform.test")
            .await?
            .ok_or_else(|| RagError::internal("bootstrap produced no key"))?;

        let registered = platform
            .dispatcher
            .dispatch(
                "rag_register_tenant",
                serde_json::json!({
                    "tenant_name": "acme",
                    "template_name": "retail-catalog",
                    "tier": "enterprise",
                    "admin_email": "admin@acme.test",
                }),
                material(&uber_key),
            )
            .await?;
        let tenant_id: Uuid = registered["tenant_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RagError::internal("registration returned no tenant_id"))?;
        let admin_key = registered["api_key"]
            .as_str()
            .ok_or_else(|| RagError::internal("registration returned no api key"))?
            .to_string();

        let (project_key, _) =
            seed_principal(&platform, tenant_id, "writer@acme.test", Role::ProjectAdmin).await?;
        let (end_user_key, end_user_id) =
            seed_principal(&platform, tenant_id, "reader@acme.test", Role::EndUser).await?;

        Ok(Self {
            platform,
            tenant_id,
            uber_key,
            admin_key,
            project_key,
            end_user_key,
            end_user_id,
            _dir: dir,
        })
    }

    /// Dispatch a tool call authenticated with `key`.
    pub async fn call(&self, key: &str, tool: &str, args: Value) -> Result<Value> {
        self.platform
            .dispatcher
            .dispatch(tool, args, material(key))
            .await
    }

    /// Register an additional tenant, returning its id and admin key.
    pub async fn register_tenant(&self, name: &str) -> Result<(Uuid, String)> {
        let registered = self
            .call(
                &self.uber_key,
                "rag_register_tenant",
                serde_json::json!({
                    "tenant_name": name,
                    "template_name": "custom",
                    "tier": "enterprise",
                    "admin_email": format!("admin@{name}.test"),
                }),
            )
            .await?;
        let tenant_id = registered["tenant_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RagError::internal("registration returned no tenant_id"))?;
        let key = registered["api_key"]
            .as_str()
            .ok_or_else(|| RagError::internal("registration returned no api key"))?
            .to_string();
        Ok((tenant_id, key))
    }

    /// Ingest a document as the project admin, returning its id.
    pub async fn ingest(&self, title: &str, content: &str) -> Result<Uuid> {
        let result = self
            .call(
                &self.project_key,
                "rag_ingest",
                serde_json::json!({
                    "document_content": content,
                    "metadata": { "title": title },
                }),
            )
            .await?;
        result["document_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RagError::internal("ingest returned no document_id"))
    }
}

/// Credential material for an API-key call
#[must_use]
pub fn material(key: &str) -> AuthMaterial {
    AuthMaterial {
        api_key: Some(key.to_string()),
        ..AuthMaterial::default()
    }
}

async fn seed_principal(
    platform: &Platform,
    tenant_id: Uuid,
    email: &str,
    role: Role,
) -> Result<(String, Uuid)> {
    let user = User::new(tenant_id, email, role);
    let user_id = user.user_id;
    platform.tools.repos.users.insert_user(user).await?;

    let plaintext = format!("rsk-test-{user_id}");
    let key = TenantApiKey::new(tenant_id, user_id, email, "74657374", &plaintext);
    platform.tools.repos.api_keys.insert_key(key).await?;
    Ok((plaintext, user_id))
}

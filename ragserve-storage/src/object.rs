//! Filesystem-backed object store.
//!
//! One directory per tenant bucket, `tenant-{tenant_id}/`, with documents at
//! key `documents/{document_id}`. The bucket contract (naming, on-demand
//! creation, prefix validation) matches an S3-compatible backend so the
//! adapter stays swappable.

use async_trait::async_trait;
use ragserve_core::context::check_resource_tenant;
use ragserve_core::traits::object::{bucket_name, validate_bucket_name, ObjectStore};
use ragserve_core::{RagError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Object store rooted at a local directory
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn open(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| RagError::internal(format!("cannot create object root: {e}")))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn bucket_path(&self, tenant_id: Uuid) -> Result<PathBuf> {
        let bucket = bucket_name(tenant_id);
        // Guard kept even though the name is derived here: the same check
        // applies to externally supplied bucket names on restore paths.
        validate_bucket_name(&bucket, tenant_id)?;
        Ok(self.root.join(bucket))
    }

    fn object_path(&self, tenant_id: Uuid, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return Err(RagError::validation_field(
                format!("invalid object key: {key}"),
                "key",
            ));
        }
        Ok(self.bucket_path(tenant_id)?.join(key))
    }

    fn collect_keys(dir: &Path, base: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                Self::collect_keys(&path, base, out)?;
            } else if let Ok(rel) = path.strip_prefix(base) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn ensure_bucket(&self, tenant_id: Uuid) -> Result<String> {
        check_resource_tenant(tenant_id)?;
        let path = self.bucket_path(tenant_id)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            fs::create_dir_all(&path)
                .await
                .map_err(|e| RagError::transient(format!("cannot create bucket: {e}")))?;
            info!(tenant_id = %tenant_id, "created tenant bucket");
        }
        Ok(bucket_name(tenant_id))
    }

    async fn put(&self, tenant_id: Uuid, key: &str, bytes: &[u8]) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let path = self.object_path(tenant_id, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| RagError::transient(format!("cannot create object prefix: {e}")))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| RagError::transient(format!("cannot write object {key}: {e}")))?;
        debug!(tenant_id = %tenant_id, key, size = bytes.len(), "stored object");
        Ok(())
    }

    async fn get(&self, tenant_id: Uuid, key: &str) -> Result<Option<Vec<u8>>> {
        check_resource_tenant(tenant_id)?;
        let path = self.object_path(tenant_id, key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RagError::transient(format!(
                "cannot read object {key}: {e}"
            ))),
        }
    }

    async fn delete(&self, tenant_id: Uuid, key: &str) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let path = self.object_path(tenant_id, key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::transient(format!(
                "cannot delete object {key}: {e}"
            ))),
        }
    }

    async fn list(&self, tenant_id: Uuid, prefix: &str) -> Result<Vec<String>> {
        check_resource_tenant(tenant_id)?;
        let bucket = self.bucket_path(tenant_id)?;
        if !fs::try_exists(&bucket).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let prefix = prefix.to_string();
        let keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            Self::collect_keys(&bucket, &bucket, &mut keys)?;
            Ok::<_, std::io::Error>(keys)
        })
        .await
        .map_err(|e| RagError::internal(format!("list task failed: {e}")))?
        .map_err(|e| RagError::transient(format!("cannot list bucket: {e}")))?;

        let mut keys: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(&prefix))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete_bucket(&self, tenant_id: Uuid) -> Result<()> {
        check_resource_tenant(tenant_id)?;
        let path = self.bucket_path(tenant_id)?;
        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(tenant_id = %tenant_id, "deleted tenant bucket");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::transient(format!("cannot delete bucket: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragserve_core::context::{scope, RequestContext};
    use ragserve_core::model::user::Role;

    fn ctx(tenant: Uuid) -> RequestContext {
        RequestContext::new()
            .with_tenant(tenant)
            .with_role(Role::ProjectAdmin)
    }

    #[tokio::test]
    async fn put_get_list_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        let tenant = Uuid::new_v4();
        let doc = Uuid::new_v4();
        let key = format!("documents/{doc}");

        scope(ctx(tenant), async {
            store.ensure_bucket(tenant).await.unwrap();
            store.put(tenant, &key, b"hello world").await.unwrap();

            assert_eq!(
                store.get(tenant, &key).await.unwrap().unwrap(),
                b"hello world"
            );
            assert_eq!(store.list(tenant, "documents/").await.unwrap(), vec![key.clone()]);

            store.delete(tenant, &key).await.unwrap();
            assert!(store.get(tenant, &key).await.unwrap().is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        let tenant = Uuid::new_v4();

        scope(ctx(tenant), async {
            let err = store.put(tenant, "../escape", b"x").await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
        })
        .await;
    }

    #[tokio::test]
    async fn cross_tenant_access_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();
        let t1 = Uuid::new_v4();
        let t2 = Uuid::new_v4();

        scope(ctx(t1), async {
            store.put(t1, "documents/a", b"secret").await.unwrap();
        })
        .await;

        scope(ctx(t2), async {
            let err = store.get(t1, "documents/a").await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::TenantIsolation);
        })
        .await;
    }
}

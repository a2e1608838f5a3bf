//! Per-tenant object store trait and bucket naming

use crate::error::{RagError, Result};
use async_trait::async_trait;
use uuid::Uuid;

/// Bucket naming convention: one bucket per tenant
#[must_use]
pub fn bucket_name(tenant_id: Uuid) -> String {
    format!("tenant-{tenant_id}")
}

/// Defense in depth: a bucket name must carry the `tenant-` prefix and embed
/// exactly the expected tenant.
pub fn validate_bucket_name(bucket: &str, expected_tenant: Uuid) -> Result<()> {
    let Some(embedded) = bucket.strip_prefix("tenant-") else {
        return Err(RagError::tenant_isolation(format!(
            "bucket {bucket} is not tenant-scoped"
        )));
    };
    let embedded: Uuid = embedded.parse().map_err(|_| {
        RagError::tenant_isolation(format!("bucket {bucket} embeds an invalid tenant id"))
    })?;
    if embedded == expected_tenant {
        Ok(())
    } else {
        Err(RagError::tenant_isolation(format!(
            "bucket {bucket} does not belong to tenant {expected_tenant}"
        )))
    }
}

/// Tenant-scoped object storage. Documents live at key
/// `documents/{document_id}` inside bucket `tenant-{tenant_id}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Resolve the tenant's bucket, creating it on demand. Returns its name.
    async fn ensure_bucket(&self, tenant_id: Uuid) -> Result<String>;

    async fn put(&self, tenant_id: Uuid, key: &str, bytes: &[u8]) -> Result<()>;
    async fn get(&self, tenant_id: Uuid, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, tenant_id: Uuid, key: &str) -> Result<()>;
    /// Keys under `prefix`, sorted
    async fn list(&self, tenant_id: Uuid, prefix: &str) -> Result<Vec<String>>;
    async fn delete_bucket(&self, tenant_id: Uuid) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_validation_rejects_foreign_and_unscoped() {
        let tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(validate_bucket_name(&bucket_name(tenant), tenant).is_ok());
        assert!(validate_bucket_name(&bucket_name(other), tenant).is_err());
        assert!(validate_bucket_name("shared-data", tenant).is_err());
        assert!(validate_bucket_name("tenant-not-a-uuid", tenant).is_err());
    }
}

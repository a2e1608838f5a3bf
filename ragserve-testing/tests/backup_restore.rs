//! Backup, validation, restore, rebuild, and destructive-operation gating.

use ragserve_core::traits::relational::TenantStore;
use ragserve_core::ErrorKind;
use ragserve_testing::TestPlatform;
use serde_json::json;

#[tokio::test]
async fn backup_restore_validate_preserves_document_counts() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("first", "first document body").await.unwrap();
    harness.ingest("second", "second document body").await.unwrap();

    let manifest = harness
        .call(&harness.admin_key, "rag_backup_tenant_data", json!({}))
        .await
        .unwrap();
    assert_eq!(manifest["status"], "completed");
    let backup_id = manifest["backup_id"].as_str().unwrap().to_string();
    assert_eq!(manifest["components"]["postgresql"]["record_count"], 2);
    assert_eq!(manifest["components"]["minio"]["object_count"], 2);
    assert_eq!(manifest["components"]["meilisearch"]["document_count"], 2);
    assert!(manifest["total_size"].as_u64().unwrap() > 0);

    let validation = harness
        .call(
            &harness.admin_key,
            "rag_validate_backup",
            json!({ "backup_id": backup_id }),
        )
        .await
        .unwrap();
    assert_eq!(validation["validation"]["status"], "passed");

    let restore = harness
        .call(
            &harness.uber_key,
            "rag_restore_tenant_data",
            json!({
                "tenant_id": harness.tenant_id,
                "backup_id": backup_id,
                "confirmation": true,
            }),
        )
        .await
        .unwrap();
    assert_eq!(restore["status"], "completed");
    assert!(restore["safety_backup_id"].as_str().unwrap().starts_with("backup_"));

    let listing = harness
        .call(&harness.end_user_key, "rag_list_documents", json!({}))
        .await
        .unwrap();
    assert_eq!(listing["total"], 2);

    // Search still works over the restored backends
    let result = harness
        .call(&harness.end_user_key, "rag_search", json!({ "query": "first" }))
        .await
        .unwrap();
    assert!(!result["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn restore_without_confirmation_is_rejected_before_any_write() {
    let harness = TestPlatform::new().await.unwrap();
    let err = harness
        .call(
            &harness.uber_key,
            "rag_restore_tenant_data",
            json!({ "tenant_id": harness.tenant_id, "backup_id": "backup_x" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn validation_fails_after_tampering() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("doc", "document body").await.unwrap();

    let manifest = harness
        .call(&harness.admin_key, "rag_backup_tenant_data", json!({}))
        .await
        .unwrap();
    let backup_id = manifest["backup_id"].as_str().unwrap();
    let dump_path = manifest["components"]["postgresql"]["file_path"]
        .as_str()
        .unwrap()
        .to_string();
    std::fs::write(&dump_path, b"tampered").unwrap();

    let validation = harness
        .call(
            &harness.admin_key,
            "rag_validate_backup",
            json!({ "backup_id": backup_id }),
        )
        .await
        .unwrap();
    assert_eq!(validation["validation"]["status"], "failed");
    assert_eq!(validation["validation"]["checks"]["checksums"], false);
}

#[tokio::test]
async fn incremental_backup_degrades_to_full_with_a_flag() {
    let harness = TestPlatform::new().await.unwrap();
    let manifest = harness
        .call(
            &harness.admin_key,
            "rag_backup_tenant_data",
            json!({ "backup_type": "incremental" }),
        )
        .await
        .unwrap();
    assert_eq!(manifest["backup_type"], "full");
    assert_eq!(manifest["degraded_to_full"], true);
}

#[tokio::test]
async fn rebuild_requires_the_exact_confirmation_code() {
    let harness = TestPlatform::new().await.unwrap();
    for doc in 0..3 {
        harness
            .ingest(&format!("doc-{doc}"), &format!("content number {doc}"))
            .await
            .unwrap();
    }

    let err = harness
        .call(&harness.admin_key, "rag_rebuild_index", json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = harness
        .call(
            &harness.admin_key,
            "rag_rebuild_index",
            json!({ "confirmation_code": "WRONG" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let result = harness
        .call(
            &harness.admin_key,
            "rag_rebuild_index",
            json!({ "confirmation_code": "FR-BACKUP-004" }),
        )
        .await
        .unwrap();
    assert_eq!(result["documents_processed"], 3);
    assert_eq!(result["index_size"], 3);
    assert_eq!(result["integrity_validated"], true);

    // The rebuilt index still serves searches
    let search = harness
        .call(&harness.end_user_key, "rag_search", json!({ "query": "content" }))
        .await
        .unwrap();
    assert!(!search["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn tenant_deletion_requires_literal_confirmations() {
    let harness = TestPlatform::new().await.unwrap();
    let (tenant, _) = harness.register_tenant("victim").await.unwrap();

    let err = harness
        .call(
            &harness.uber_key,
            "rag_delete_tenant",
            json!({ "tenant_id": tenant, "delete_type": "soft", "confirmation": "yes" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = harness
        .call(
            &harness.uber_key,
            "rag_delete_tenant",
            json!({ "tenant_id": tenant, "delete_type": "hard", "confirmation": "SOFT_DELETE" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let result = harness
        .call(
            &harness.uber_key,
            "rag_delete_tenant",
            json!({ "tenant_id": tenant, "delete_type": "hard", "confirmation": "DELETE" }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "hard_deleted");
    assert_eq!(result["audit_logs_retained"], true);
    assert!(result["safety_backup_id"].as_str().unwrap().starts_with("backup_"));

    // The tenant row is gone
    let tenants = harness.platform.tools.repos.tenants.list_tenants().await.unwrap();
    assert!(tenants.iter().all(|t| t.tenant_id != tenant));
}

#[tokio::test]
async fn background_rebuild_returns_a_job_handle() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("doc", "some content").await.unwrap();

    let result = harness
        .call(
            &harness.admin_key,
            "rag_rebuild_index",
            json!({ "confirmation_code": "FR-BACKUP-004", "background": true }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "started");
    assert!(result["job_id"].is_string());
}

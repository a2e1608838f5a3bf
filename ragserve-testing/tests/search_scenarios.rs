//! End-to-end search scenarios over the embedded platform.

use ragserve_core::traits::object::ObjectStore;
use ragserve_core::traits::relational::DocumentStore;
use ragserve_core::traits::vector::VectorIndex;
use ragserve_testing::TestPlatform;
use serde_json::json;

#[tokio::test]
async fn hybrid_search_ranks_matching_documents_first() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("alpha", "alpha").await.unwrap();
    harness.ingest("beta", "beta").await.unwrap();
    harness.ingest("gamma", "gamma").await.unwrap();

    let result = harness
        .call(
            &harness.end_user_key,
            "rag_search",
            json!({ "query": "alpha beta" }),
        )
        .await
        .unwrap();

    assert_eq!(result["search_mode"], "hybrid");
    assert_eq!(result["fallback_triggered"], false);
    assert_eq!(result["vector_success"], true);
    assert_eq!(result["keyword_success"], true);

    let results = result["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    let top_two: Vec<&str> = results[..2]
        .iter()
        .map(|r| r["title"].as_str().unwrap())
        .collect();
    assert!(top_two.contains(&"alpha"));
    assert!(top_two.contains(&"beta"));
    assert_eq!(results[2]["title"], "gamma");

    // Scores are sorted descending
    let scores: Vec<f64> = results
        .iter()
        .map(|r| r["score"].as_f64().unwrap())
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn search_results_hydrate_title_metadata_and_snippet() {
    let harness = TestPlatform::new().await.unwrap();
    let result = harness
        .call(
            &harness.project_key,
            "rag_ingest",
            json!({
                "document_content": "quarterly revenue grew twelve percent",
                "metadata": { "title": "Q3 revenue report", "source": "finance", "type": "report" },
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "success");

    let result = harness
        .call(
            &harness.end_user_key,
            "rag_search",
            json!({ "query": "revenue" }),
        )
        .await
        .unwrap();
    let hit = &result["results"][0];
    assert_eq!(hit["title"], "Q3 revenue report");
    assert_eq!(hit["source"], "finance");
    assert_eq!(hit["snippet"], "Q3 revenue report");
    assert!(hit["timestamp"].is_string());
}

#[tokio::test]
async fn empty_query_is_a_validation_error() {
    let harness = TestPlatform::new().await.unwrap();
    let err = harness
        .call(&harness.end_user_key, "rag_search", json!({ "query": "   " }))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation);
}

#[tokio::test]
async fn limit_bounds_are_enforced_on_search_and_listing() {
    let harness = TestPlatform::new().await.unwrap();

    for (tool, args) in [
        ("rag_search", json!({ "query": "x", "limit": 0 })),
        ("rag_search", json!({ "query": "x", "limit": 101 })),
        ("rag_list_documents", json!({ "limit": 0 })),
        ("rag_list_documents", json!({ "limit": 200 })),
    ] {
        let err = harness
            .call(&harness.end_user_key, tool, args)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ragserve_core::ErrorKind::Validation, "{tool}");
    }
}

#[tokio::test]
async fn soft_deleted_documents_vanish_from_search_and_reads() {
    let harness = TestPlatform::new().await.unwrap();
    let doc_id = harness.ingest("ephemeral", "ephemeral content").await.unwrap();

    let result = harness
        .call(
            &harness.project_key,
            "rag_delete_document",
            json!({ "document_id": doc_id }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "deleted");

    // Idempotent second delete
    let result = harness
        .call(
            &harness.project_key,
            "rag_delete_document",
            json!({ "document_id": doc_id }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "already_deleted");

    let err = harness
        .call(
            &harness.end_user_key,
            "rag_get_document",
            json!({ "document_id": doc_id }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ragserve_core::ErrorKind::NotFound);

    let result = harness
        .call(
            &harness.end_user_key,
            "rag_search",
            json!({ "query": "ephemeral" }),
        )
        .await
        .unwrap();
    assert!(result["results"].as_array().unwrap().is_empty());

    let listing = harness
        .call(&harness.end_user_key, "rag_list_documents", json!({}))
        .await
        .unwrap();
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn duplicate_content_is_deduplicated() {
    let harness = TestPlatform::new().await.unwrap();

    let first = harness
        .call(
            &harness.project_key,
            "rag_ingest",
            json!({ "document_content": "hello", "metadata": { "title": "greeting" } }),
        )
        .await
        .unwrap();
    assert_eq!(first["status"], "success");
    let original_id = first["document_id"].as_str().unwrap().to_string();

    let second = harness
        .call(
            &harness.project_key,
            "rag_ingest",
            json!({ "document_content": "hello", "metadata": { "title": "greeting again" } }),
        )
        .await
        .unwrap();
    assert_eq!(second["status"], "duplicate");
    assert_eq!(second["existing_document_id"], original_id.as_str());
}

#[tokio::test]
async fn reingestion_with_new_content_snapshots_a_version() {
    let harness = TestPlatform::new().await.unwrap();
    let doc_id = harness.ingest("versioned", "v1").await.unwrap();

    let result = harness
        .call(
            &harness.project_key,
            "rag_ingest",
            json!({
                "document_content": "v2",
                "metadata": { "title": "versioned" },
                "document_id": doc_id,
            }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "success");
    assert_eq!(result["version_number"], 2);

    // The prior state is snapshotted with the old hash
    let tenant_id = harness.tenant_id;
    let repos = harness.platform.tools.repos.clone();
    let versions = ragserve_core::context::scope(
        ragserve_core::RequestContext::new()
            .with_tenant(tenant_id)
            .with_role(ragserve_core::Role::TenantAdmin),
        async move { repos.documents.list_versions(tenant_id, doc_id).await },
    )
    .await
    .unwrap();
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].version_number, 1);
    assert_eq!(
        versions[0].content_hash,
        ragserve_core::model::document::hash_content(b"v1")
    );

    let doc = harness
        .call(
            &harness.end_user_key,
            "rag_get_document",
            json!({ "document_id": doc_id }),
        )
        .await
        .unwrap();
    assert_eq!(doc["version_number"], 2);
    assert_eq!(doc["content"], "v2");
}

#[tokio::test]
async fn tenants_never_see_each_other() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("secret plans", "secret plans").await.unwrap();

    let (other_tenant, other_key) = harness.register_tenant("globex").await.unwrap();
    assert_ne!(other_tenant, harness.tenant_id);

    let result = harness
        .call(&other_key, "rag_search", json!({ "query": "secret plans" }))
        .await
        .unwrap();
    assert!(result["results"].as_array().unwrap().is_empty());

    // Adapter-level isolation: a request context bound to the second tenant
    // cannot touch the first tenant's bucket or index
    let objects = harness.platform.tools.objects.clone();
    let vector = harness.platform.tools.vector.clone();
    let t1 = harness.tenant_id;
    ragserve_core::context::scope(
        ragserve_core::RequestContext::new()
            .with_tenant(other_tenant)
            .with_role(ragserve_core::Role::TenantAdmin),
        async move {
            let err = objects.list(t1, "").await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::TenantIsolation);
            let err = vector.search(t1, &[0.0; 4], 5).await.unwrap_err();
            assert_eq!(err.kind(), ragserve_core::ErrorKind::TenantIsolation);
        },
    )
    .await;
}

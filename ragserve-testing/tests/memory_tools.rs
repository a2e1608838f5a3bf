//! User-scoped memory tools: CRUD, search, and user-boundary enforcement.

use ragserve_core::ErrorKind;
use ragserve_testing::TestPlatform;
use serde_json::json;

#[tokio::test]
async fn memory_round_trip_for_own_user() {
    let harness = TestPlatform::new().await.unwrap();

    let result = harness
        .call(
            &harness.end_user_key,
            "mem0_update_memory",
            json!({ "key": "preferred_language", "value": "rust" }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "updated");

    let result = harness
        .call(
            &harness.end_user_key,
            "mem0_get_user_memory",
            json!({ "key": "preferred_language" }),
        )
        .await
        .unwrap();
    assert_eq!(result["memory"]["value"], "rust");

    let result = harness
        .call(
            &harness.end_user_key,
            "mem0_search_memory",
            json!({ "query": "rust" }),
        )
        .await
        .unwrap();
    assert_eq!(result["total"], 1);

    // Null clears the slot
    let result = harness
        .call(
            &harness.end_user_key,
            "mem0_update_memory",
            json!({ "key": "preferred_language", "value": null }),
        )
        .await
        .unwrap();
    assert_eq!(result["status"], "deleted");

    let err = harness
        .call(
            &harness.end_user_key,
            "mem0_get_user_memory",
            json!({ "key": "preferred_language" }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn end_users_cannot_read_other_users_memory() {
    let harness = TestPlatform::new().await.unwrap();
    let foreign_user = uuid::Uuid::new_v4();

    let err = harness
        .call(
            &harness.end_user_key,
            "mem0_get_user_memory",
            json!({ "user_id": foreign_user }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    // Tenant admins may address users in their tenant
    let result = harness
        .call(
            &harness.admin_key,
            "mem0_get_user_memory",
            json!({ "user_id": harness.end_user_id }),
        )
        .await
        .unwrap();
    assert_eq!(result["total"], 0);
}

#[tokio::test]
async fn memory_is_tenant_scoped() {
    let harness = TestPlatform::new().await.unwrap();
    harness
        .call(
            &harness.end_user_key,
            "mem0_update_memory",
            json!({ "key": "note", "value": "acme-only" }),
        )
        .await
        .unwrap();

    let (_, other_key) = harness.register_tenant("globex").await.unwrap();
    let result = harness
        .call(&other_key, "mem0_search_memory", json!({ "query": "acme-only" }))
        .await
        .unwrap();
    assert_eq!(result["total"], 0);
}

#[tokio::test]
async fn personalization_prefers_remembered_topics_and_survives_failure() {
    let harness = TestPlatform::new().await.unwrap();
    harness.ingest("cooking basics", "pasta and sauces").await.unwrap();
    harness.ingest("rust patterns", "ownership and borrowing").await.unwrap();

    harness
        .call(
            &harness.end_user_key,
            "mem0_update_memory",
            json!({ "key": "preferred_topics", "value": ["rust"] }),
        )
        .await
        .unwrap();

    let result = harness
        .call(
            &harness.end_user_key,
            "rag_search",
            json!({ "query": "cooking rust", "enable_personalization": true }),
        )
        .await
        .unwrap();
    let results = result["results"].as_array().unwrap();
    assert_eq!(results[0]["title"], "rust patterns");

    // Without the preference the call still succeeds unpersonalized
    harness
        .call(
            &harness.end_user_key,
            "mem0_update_memory",
            json!({ "key": "preferred_topics", "value": null }),
        )
        .await
        .unwrap();
    let result = harness
        .call(
            &harness.end_user_key,
            "rag_search",
            json!({ "query": "cooking rust", "enable_personalization": true }),
        )
        .await
        .unwrap();
    assert!(!result["results"].as_array().unwrap().is_empty());
}

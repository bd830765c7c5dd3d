//! Integration tests for CRD operations
//!
//! These tests tell the story of how users interact with WorkloadAction
//! resources through the Kubernetes API.

use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::Client;

use rabbit_stalker::crd::{
    ConditionReason, ConditionStatus, WorkloadAction, WorkloadActionStatus,
};
use rabbit_stalker::status::ready_condition;
use rabbit_stalker::FIELD_MANAGER;

use super::helpers::{ensure_test_cluster, sample_workload_action, TEST_NAMESPACE};

async fn cleanup(client: &Client, name: &str) {
    let api: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// Story: A user creates a WorkloadAction and reads it back unchanged
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_user_creates_workload_action() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-create";
    cleanup(&client, name).await;

    let wa = sample_workload_action(name, "http://rabbitmq:15672", "order-consumer");
    api.create(&PostParams::default(), &wa)
        .await
        .expect("failed to create WorkloadAction");

    let fetched = api.get(name).await.expect("failed to get WorkloadAction");
    assert_eq!(fetched.spec, wa.spec);
    assert!(fetched.status.is_none());

    cleanup(&client, name).await;
}

/// Story: The status subresource only carries conditions
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_status_subresource_accepts_conditions() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let api: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let name = "test-status";
    cleanup(&client, name).await;

    let wa = sample_workload_action(name, "http://rabbitmq:15672", "order-consumer");
    api.create(&PostParams::default(), &wa)
        .await
        .expect("failed to create WorkloadAction");

    let status = WorkloadActionStatus {
        conditions: vec![ready_condition(
            ConditionStatus::False,
            ConditionReason::CredentialsNotValid,
            "unauthorized",
            chrono::Utc::now(),
        )],
    };
    api.patch_status(
        name,
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(serde_json::json!({ "status": status })),
    )
    .await
    .expect("failed to patch status");

    let fetched = api.get(name).await.expect("failed to get WorkloadAction");
    let ready = fetched
        .status
        .and_then(|s| s.get("Ready").cloned())
        .expect("Ready condition should be stored");
    assert_eq!(ready.reason, "CredentialsNotValid");

    cleanup(&client, name).await;
}

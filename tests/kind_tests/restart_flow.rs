//! Integration tests for a full reconciliation pass
//!
//! The reconciler runs in-process against the kind API server; the broker is a
//! local HTTP server answering with a canned queue document.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;

use rabbit_stalker::controller::{reconcile, Context};
use rabbit_stalker::crd::{ConditionStatus, WorkloadAction};
use rabbit_stalker::RESTARTED_AT_ANNOTATION;

use super::helpers::{ensure_test_cluster, sample_workload_action, TEST_NAMESPACE};

fn sample_deployment(name: &str, paused: bool) -> Deployment {
    let labels = BTreeMap::from([("app".to_string(), name.to_string())]);
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(TEST_NAMESPACE.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            paused: Some(paused),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "consumer".to_string(),
                        image: Some("busybox:1.36".to_string()),
                        command: Some(vec!["sleep".to_string(), "3600".to_string()]),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

async fn cleanup(client: &Client, name: &str) {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let actions: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let _ = deployments.delete(name, &DeleteParams::default()).await;
    let _ = actions.delete(name, &DeleteParams::default()).await;
}

async fn create_fixtures(
    client: &Client,
    name: &str,
    broker_url: &str,
    paused: bool,
) -> WorkloadAction {
    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let actions: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);

    deployments
        .create(&PostParams::default(), &sample_deployment(name, paused))
        .await
        .expect("failed to create Deployment");
    actions
        .create(
            &PostParams::default(),
            &sample_workload_action(name, broker_url, name),
        )
        .await
        .expect("failed to create WorkloadAction")
}

fn restart_annotation(deployment: &Deployment) -> Option<String> {
    deployment
        .spec
        .as_ref()?
        .template
        .metadata
        .as_ref()?
        .annotations
        .as_ref()?
        .get(RESTARTED_AT_ANNOTATION)
        .cloned()
}

/// Story: An idle queue rolls the consumer Deployment
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_idle_queue_restarts_deployment() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "idle-consumer";
    cleanup(&client, name).await;

    let mut broker = mockito::Server::new_async().await;
    broker
        .mock("GET", "/api/queues/%2F/orders")
        .with_status(200)
        .with_body(r#"{"name":"orders","messages_ready":0}"#)
        .create_async()
        .await;

    let wa = create_fixtures(&client, name, &broker.url(), false).await;
    let ctx = Arc::new(
        Context::builder(client.clone())
            .build()
            .expect("failed to build context"),
    );

    reconcile(Arc::new(wa), ctx).await.expect("pass should succeed");

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let deployment = deployments.get(name).await.expect("failed to get Deployment");
    let stamp = restart_annotation(&deployment).expect("restart annotation should be set");
    assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());

    let actions: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let ready = actions
        .get(name)
        .await
        .expect("failed to get WorkloadAction")
        .status
        .and_then(|s| s.get("Ready").cloned())
        .expect("Ready condition should be recorded");
    assert_eq!(ready.status, ConditionStatus::True);
    assert_eq!(ready.reason, "WorkloadRestarted");

    cleanup(&client, name).await;
}

/// Story: A paused Deployment is left alone and the reason is recorded
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_paused_deployment_is_reported() {
    let client = ensure_test_cluster()
        .await
        .expect("failed to setup cluster");
    let name = "paused-consumer";
    cleanup(&client, name).await;

    let mut broker = mockito::Server::new_async().await;
    broker
        .mock("GET", "/api/queues/%2F/orders")
        .with_status(200)
        .with_body(r#"{"messages_ready":0}"#)
        .create_async()
        .await;

    let wa = create_fixtures(&client, name, &broker.url(), true).await;
    let ctx = Arc::new(
        Context::builder(client.clone())
            .build()
            .expect("failed to build context"),
    );

    reconcile(Arc::new(wa), ctx)
        .await
        .expect_err("paused Deployment should fail the pass");

    let deployments: Api<Deployment> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let deployment = deployments.get(name).await.expect("failed to get Deployment");
    assert!(restart_annotation(&deployment).is_none());

    let actions: Api<WorkloadAction> = Api::namespaced(client.clone(), TEST_NAMESPACE);
    let ready = actions
        .get(name)
        .await
        .expect("failed to get WorkloadAction")
        .status
        .and_then(|s| s.get("Ready").cloned())
        .expect("Ready condition should be recorded");
    assert_eq!(ready.status, ConditionStatus::False);
    assert_eq!(ready.reason, "PausedWorkloadRestart");

    cleanup(&client, name).await;
}

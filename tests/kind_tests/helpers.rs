//! Shared fixtures for the kind tests

use std::time::Duration;

use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, CustomResourceExt};

use rabbit_stalker::crd::{
    ConditionSpec, RabbitConnection, SynchronizationSpec, WorkloadAction, WorkloadActionSpec,
    WorkloadRef,
};
use rabbit_stalker::FIELD_MANAGER;

/// Namespace every test works in
pub const TEST_NAMESPACE: &str = "rabbit-stalker-test";

/// Connect to the current kube context, install the CRD and create the test namespace
pub async fn ensure_test_cluster() -> Result<Client, Box<dyn std::error::Error>> {
    let client = Client::try_default().await?;

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    crds.patch(
        WorkloadAction::crd_name(),
        &PatchParams::apply(FIELD_MANAGER).force(),
        &Patch::Apply(&WorkloadAction::crd()),
    )
    .await?;

    // the CRD needs a moment before the API server serves it
    tokio::time::sleep(Duration::from_secs(2)).await;

    let namespaces: Api<Namespace> = Api::all(client.clone());
    if namespaces.get_opt(TEST_NAMESPACE).await?.is_none() {
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(TEST_NAMESPACE.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        namespaces.create(&PostParams::default(), &ns).await?;
    }

    Ok(client)
}

/// WorkloadAction restarting `deployment` when `messages_ready` is 0
pub fn sample_workload_action(name: &str, broker_url: &str, deployment: &str) -> WorkloadAction {
    let mut wa = WorkloadAction::new(
        name,
        WorkloadActionSpec {
            synchronization: SynchronizationSpec {
                time: "30s".to_string(),
            },
            rabbit_connection: RabbitConnection {
                url: broker_url.to_string(),
                vhost: "/".to_string(),
                queue: "orders".to_string(),
                credentials: None,
            },
            condition: ConditionSpec {
                key: "messages_ready".to_string(),
                value: "0".to_string(),
            },
            workload_ref: WorkloadRef {
                group: "apps".to_string(),
                version: "v1".to_string(),
                kind: "Deployment".to_string(),
                namespace: TEST_NAMESPACE.to_string(),
                name: deployment.to_string(),
            },
            action: "restart".to_string(),
        },
    );
    wa.metadata.namespace = Some(TEST_NAMESPACE.to_string());
    wa
}

//! Guarded restart of Deployments, StatefulSets and DaemonSets
//!
//! A restart stamps the pod template with an annotation holding the current
//! time, which makes the workload controller roll every pod. This is the same
//! mechanism `kubectl rollout restart` uses, under a different key.

use chrono::{DateTime, SecondsFormat, Utc};
use kube::api::DynamicObject;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::controller::KubeClient;
use crate::crd::WorkloadRef;
use crate::{Error, RESTARTED_AT_ANNOTATION};

/// Kinds whose pod template can be restarted
pub const RESTARTABLE_KINDS: [&str; 3] = ["Deployment", "StatefulSet", "DaemonSet"];

/// Reject kinds without a rollout-managed pod template
pub fn ensure_restartable(kind: &str) -> Result<(), Error> {
    if RESTARTABLE_KINDS.contains(&kind) {
        Ok(())
    } else {
        Err(Error::WorkloadRestartNotSupported {
            kind: kind.to_string(),
        })
    }
}

/// Reject paused Deployments, which would not roll until resumed
pub fn ensure_not_paused(kind: &str, workload: &DynamicObject) -> Result<(), Error> {
    let paused = workload
        .data
        .pointer("/spec/paused")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if kind == "Deployment" && paused {
        return Err(Error::PausedWorkloadRestart);
    }
    Ok(())
}

/// Merge patch setting only the restart annotation on the pod template
pub fn restart_patch(restarted_at: &str) -> Value {
    json!({
        "spec": {
            "template": {
                "metadata": {
                    "annotations": {
                        RESTARTED_AT_ANNOTATION: restarted_at
                    }
                }
            }
        }
    })
}

/// Restart `workload`, returning the timestamp written to the annotation
///
/// Every call triggers a new rollout, even if one happened moments ago.
pub async fn restart(
    kube: &dyn KubeClient,
    target: &WorkloadRef,
    workload: &DynamicObject,
    now: DateTime<Utc>,
) -> Result<String, Error> {
    ensure_restartable(&target.kind)?;
    ensure_not_paused(&target.kind, workload)?;

    let previous = &workload.data["spec"]["template"]["metadata"]["annotations"]
        [RESTARTED_AT_ANNOTATION];
    debug!(previous = %previous, "current restart annotation");

    let restarted_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    kube.patch_workload(target, &restart_patch(&restarted_at))
        .await
        .map_err(Error::annotation_patch)?;

    info!(workload = %target, restarted_at = %restarted_at, "workload restarted");
    Ok(restarted_at)
}

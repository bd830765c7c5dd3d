//! Controller implementation for the WorkloadAction CRD
//!
//! This module contains the reconciliation logic and the runner hosting it in
//! `kube::runtime::Controller`.

mod runner;
mod workload_action;

pub use runner::{run_controller, RunnerConfig, WATCH_TIMEOUT_SECS};
pub use workload_action::{
    error_policy, reconcile, Context, ContextBuilder, KubeClient, KubeClientImpl,
};

#[cfg(test)]
pub use workload_action::MockKubeClient;

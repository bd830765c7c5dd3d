//! Integration tests for rabbit-stalker
//!
//! These tests require a Kubernetes cluster (kind) to run and tell the story
//! of how platform operators use WorkloadActions in real-world scenarios.
//!
//! # Test Organization
//!
//! - `crd_operations`: Stories about creating and reading WorkloadAction
//!   resources and writing their status through the Kubernetes API
//!
//! - `restart_flow`: Stories about a full reconciliation pass against a real
//!   Deployment, with the broker simulated by a local HTTP server
//!
//! # Running These Tests
//!
//! ```bash
//! cargo test --test kind -- --ignored --test-threads=1
//! ```

mod crd_operations;
mod helpers;
mod restart_flow;

//! # Crane Operator
//!
//! A Kubernetes operator that installs the Crane migration tooling.
//!
//! ## Overview
//!
//! The operator watches a single cluster-scoped `OperatorConfig` (named
//! `openshift-migration` by default) and keeps the Crane operands in line with
//! the manifest bundles shipped next to it:
//!
//! 1. **crane-reverse-proxy** - Deployment, Service and ConfigMap
//! 2. **crane-secret-service** - Deployment and Service
//! 3. **crane-ui-plugin** - Deployment, Service and `ConsolePlugin`
//! 4. **crane-runner** - Tekton `ClusterTask`s
//!
//! Every operand resource is owned by the `OperatorConfig`. A finalizer holds
//! the `OperatorConfig` until the operands are torn down again.
//!
//! ## Configuration
//!
//! All settings come from environment variables, see `ControllerConfig`.

use anyhow::Result;
use crane_operator::runtime::{initialization, watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialization::initialize().await?;

    watch_loop::run_watch_loop(
        init.client,
        init.configs,
        init.reconciler,
        init.server_state,
        &init.config,
    )
    .await
}

//! # Watch Loop
//!
//! Runs the kube-runtime controller over `OperatorConfig` and every kind the
//! operator creates, so drift on an operand triggers a pass for its owner.

use crate::config::ControllerConfig;
use crate::constants::REQUEUE_AFTER_FINALIZER_SECS;
use crate::controller::reconciler::{reconcile, ReconcileOutcome, Reconciler, ReconcilerError};
use crate::controller::server::ServerState;
use crate::crd::{ClusterTask, ConsolePlugin, OperatorConfig};
use crate::observability;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::{self, Action};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Restarts the controller whenever its stream ends, until a shutdown
/// signal flips the readiness flag.
pub async fn run_watch_loop(
    client: Client,
    configs: Api<OperatorConfig>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    config: &ControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");

        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    let restart_delay = config.watch_restart_delay_after_end_duration();

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        let namespace = config.install_namespace.as_str();
        let mut builder =
            Controller::new(configs.clone(), watcher::Config::default().any_semantic())
                .watches(
                    Api::<Deployment>::namespaced(client.clone(), namespace),
                    watcher::Config::default(),
                    owning_config::<Deployment>,
                )
                .watches(
                    Api::<Service>::namespaced(client.clone(), namespace),
                    watcher::Config::default(),
                    owning_config::<Service>,
                )
                .watches(
                    Api::<ConfigMap>::namespaced(client.clone(), namespace),
                    watcher::Config::default(),
                    owning_config::<ConfigMap>,
                );
        if config.watch_optional_kinds {
            builder = builder
                .watches(
                    Api::<ClusterTask>::all(client.clone()),
                    watcher::Config::default(),
                    owning_config::<ClusterTask>,
                )
                .watches(
                    Api::<ConsolePlugin>::all(client.clone()),
                    watcher::Config::default(),
                    owning_config::<ConsolePlugin>,
                );
        }

        builder
            .shutdown_on_signal()
            .run(reconcile_config, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(|x| async move {
                match x {
                    Ok((obj, _)) => {
                        debug!(resource.name = %obj.name, "watch.event.success");
                        Some(())
                    }
                    // Already handled by the error policy
                    Err(controller::Error::ReconcilerFailed(_, obj)) => {
                        debug!(resource.name = %obj.name, "watch.event.reconcile_failed");
                        Some(())
                    }
                    Err(e) => handle_watch_stream_error(&format!("{e:?}"), restart_delay).await,
                }
            })
            .for_each(|()| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

async fn reconcile_config(
    obj: Arc<OperatorConfig>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    match reconcile(&ctx, &obj.name_any()).await? {
        ReconcileOutcome::Done => Ok(Action::await_change()),
        ReconcileOutcome::Requeue => {
            observability::metrics::increment_requeues_total("finalizer");
            Ok(Action::requeue(Duration::from_secs(
                REQUEUE_AFTER_FINALIZER_SECS,
            )))
        }
    }
}

/// Map an operand to the `OperatorConfig` controlling it.
///
/// The owner is cluster-scoped, so the reference carries no namespace even
/// when the operand is namespaced.
fn owning_config<K: Resource>(obj: K) -> Option<ObjectRef<OperatorConfig>> {
    let api_version = OperatorConfig::api_version(&());
    let kind = OperatorConfig::kind(&());
    obj.meta()
        .owner_references
        .as_ref()?
        .iter()
        .find(|r| r.controller == Some(true) && r.api_version == api_version && r.kind == kind)
        .map(|r| ObjectRef::new(&r.name))
}

//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::crd::OperatorConfig;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per `OperatorConfig` name and reset by the
/// reconciler after the next clean pass.
pub fn handle_reconciliation_error(
    obj: Arc<OperatorConfig>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = obj.name_any();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.name = name.as_str(),
        error.reason = error.reason(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error);
    observability::metrics::increment_reconciliation_errors();

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states
                .entry(name.clone())
                .or_insert_with(|| BackoffState::new(ctx.backoff_min_secs, ctx.backoff_max_secs));
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!(
                "Failed to lock backoff_states: {}, using default backoff",
                e
            );
            (ctx.backoff_max_secs, 0)
        }
    };

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

/// Handle watch stream errors
///
/// Returns `None` to filter the error out (the stream will restart) or
/// `Some(())` to keep going.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: Duration) -> Option<()> {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        error = %error_string
    );

    async {
        // 404 before 401: a plain-text 404 body surfaces as a decode error
        // mentioning WatchFailed
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        let is_401 = (error_string.contains("401") || error_string.contains("Unauthorized"))
            && !is_not_found;
        let is_410 = error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone");

        if is_401 {
            error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("   kubectl auth can-i list operatorconfigs.crane.konveyor.io --as=system:serviceaccount:openshift-migration:crane-operator");
            warn!(
                "Waiting {}s before retrying watch...",
                restart_delay.as_secs()
            );
            tokio::time::sleep(restart_delay).await;
            None
        } else if is_410 {
            warn!("Watch resource version expired (410) - watch will restart");
            None
        } else if is_not_found {
            // ClusterTask or ConsolePlugin CRDs missing from the cluster
            warn!(
                "Resource not found (404) - a watched CRD may be missing, set WATCH_OPTIONAL_KINDS=false to skip optional kinds. Error: {}",
                error_string
            );
            Some(())
        } else {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(restart_delay).await;
            None
        }
    }
    .instrument(error_span)
    .await
}

//! # Lifecycle
//!
//! Entry point for one reconciliation of an `OperatorConfig`.
//!
//! ```text
//! Unseen ──not found──────────────────────────────▶ Gone
//!   │
//!   ├─wrong name──▶ NameInvalid (InvalidName=True, no operand work)
//!   │
//!   └─right name──▶ Active (InvalidName=False)
//!                     ├─ no finalizer ─▶ attach, requeue
//!                     ├─ deletion set ─▶ Terminating ─▶ teardown ─▶ drop finalizer
//!                     └─ otherwise ────▶ reconcile operands in catalog order
//! ```

use super::conditions::{find_status_condition, set_status_condition};
use super::dispatch::reconcile_operand;
use super::ownership::{add_finalizer, has_finalizer, remove_finalizer};
use super::teardown::teardown;
use super::types::{LifecycleState, ReconcileOutcome, Reconciler, ReconcilerError};
use crate::constants::{
    FINALIZER, INVALID_NAME_CONDITION_TYPE, REASON_NON_STANDARD_NAME, REASON_STANDARD_NAME,
};
use crate::controller::store::{from_dynamic, to_dynamic, ResourceKey};
use crate::crd::{Condition, OperatorConfig};
use crate::observability::metrics;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

/// Reconcile the `OperatorConfig` called `name`
pub async fn reconcile(ctx: &Reconciler, name: &str) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!("reconcile", operator_config = %name);
    let start = Instant::now();
    metrics::increment_reconciliations();

    let result = async {
        let (state, outcome) = run(ctx, name).await?;
        debug!(state = state.as_str(), outcome = ?outcome, "Reconciliation finished");
        Ok::<_, ReconcilerError>(outcome)
    }
    .instrument(span)
    .await;

    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
    result
}

async fn run(
    ctx: &Reconciler,
    name: &str,
) -> Result<(LifecycleState, ReconcileOutcome), ReconcilerError> {
    let key = ResourceKey::of::<OperatorConfig>(None, name);

    let config: OperatorConfig = match ctx.store.get(&key).await {
        Ok(obj) => from_dynamic(&key, &obj)?,
        Err(e) if e.is_not_found() => {
            debug!("OperatorConfig not found, nothing to do");
            return Ok((LifecycleState::Gone, ReconcileOutcome::Done));
        }
        Err(e) => return Err(e.into()),
    };

    if name != ctx.owner_name {
        mark_invalid_name(ctx, &key, config).await?;
        return Ok((LifecycleState::NameInvalid, ReconcileOutcome::Done));
    }

    let mut config = mark_valid_name(ctx, &key, config).await?;

    if config.metadata.deletion_timestamp.is_some() {
        if !has_finalizer(&config.metadata, FINALIZER) {
            return Ok((LifecycleState::Terminating, ReconcileOutcome::Done));
        }
        info!("OperatorConfig is being deleted, tearing down operands");
        teardown(ctx).await?;

        remove_finalizer(&mut config.metadata, FINALIZER);
        ctx.store.update(&key, &to_dynamic(&key, &config)?).await?;
        info!("Teardown complete, finalizer removed");
        return Ok((LifecycleState::Gone, ReconcileOutcome::Done));
    }

    // The finalizer must be durable before any operand exists
    if add_finalizer(&mut config.metadata, FINALIZER) {
        ctx.store.update(&key, &to_dynamic(&key, &config)?).await?;
        info!(finalizer = FINALIZER, "Finalizer attached");
        return Ok((LifecycleState::Active, ReconcileOutcome::Requeue));
    }

    for operand in &ctx.catalog {
        let applied = reconcile_operand(ctx, &config, operand).await?;
        debug!(manifest = %operand.manifest, resources = applied.len(), "Operand reconciled");
    }

    if ctx.reset_backoff(name) {
        info!("Reconciliation recovered, backoff reset");
    }
    Ok((LifecycleState::Active, ReconcileOutcome::Done))
}

async fn mark_invalid_name(
    ctx: &Reconciler,
    key: &ResourceKey,
    mut config: OperatorConfig,
) -> Result<(), ReconcilerError> {
    let name = key.name.as_str();
    let message = format!(
        "Invalid name ({name}): Only one OperatorConfig supported per cluster and must be named '{}'",
        ctx.owner_name
    );
    warn!("{message}");

    let condition = Condition {
        r#type: INVALID_NAME_CONDITION_TYPE.to_string(),
        status: "True".to_string(),
        last_transition_time: None,
        reason: Some(REASON_NON_STANDARD_NAME.to_string()),
        message: Some(message),
    };
    let status = config.status.get_or_insert_with(Default::default);
    if set_status_condition(&mut status.conditions, condition) {
        ctx.store
            .update_status(key, &to_dynamic(key, &config)?)
            .await?;
    }
    Ok(())
}

/// Flip `InvalidName` to `False` unless it already is.
/// Returns the object as stored afterwards.
async fn mark_valid_name(
    ctx: &Reconciler,
    key: &ResourceKey,
    mut config: OperatorConfig,
) -> Result<OperatorConfig, ReconcilerError> {
    let status = config.status.get_or_insert_with(Default::default);
    let already_valid = find_status_condition(&status.conditions, INVALID_NAME_CONDITION_TYPE)
        .is_some_and(|c| c.status == "False");
    if already_valid {
        return Ok(config);
    }

    set_status_condition(
        &mut status.conditions,
        Condition {
            r#type: INVALID_NAME_CONDITION_TYPE.to_string(),
            status: "False".to_string(),
            last_transition_time: None,
            reason: Some(REASON_STANDARD_NAME.to_string()),
            message: Some(format!("Valid name ({})", key.name)),
        },
    );
    let stored = ctx
        .store
        .update_status(key, &to_dynamic(key, &config)?)
        .await?;
    Ok(from_dynamic(key, &stored)?)
}

//! # Teardown
//!
//! Deletes every resource named in every operand bundle, in catalog order.
//! Blocks are only classified, never fully decoded. Missing resources count
//! as deleted, so a failed pass can simply be run again. A resource that is
//! still terminating after delete fails the pass, keeping the owner's
//! finalizer until it is really gone.

use super::dispatch::classify;
use super::ownership::remove_finalizer;
use super::types::{Reconciler, ReconcilerError};
use crate::constants::FINALIZER;
use crate::controller::manifest::is_blank;
use crate::controller::operand::Operand;
use crate::controller::store::ResourceKey;
use crate::observability::metrics;
use kube::core::DynamicObject;
use tracing::{debug, info, warn};

/// Tear down all operands. The first failure aborts the whole pass.
pub async fn teardown(ctx: &Reconciler) -> Result<(), ReconcilerError> {
    for operand in &ctx.catalog {
        teardown_operand(ctx, operand)
            .await
            .map_err(|source| ReconcilerError::Teardown {
                manifest: operand.manifest.clone(),
                source: Box::new(source),
            })?;
    }
    Ok(())
}

async fn teardown_operand(ctx: &Reconciler, operand: &Operand) -> Result<(), ReconcilerError> {
    let blocks = ctx.manifests.load(&operand.manifest).await?;

    for (index, block) in blocks.iter().enumerate() {
        if is_blank(block) {
            continue;
        }
        let doc = match classify(&operand.manifest, index, block, &ctx.install_namespace) {
            Ok(doc) => doc,
            // Never decodable, so never applied
            Err(err @ (ReconcilerError::Decode { .. } | ReconcilerError::MissingName { .. })) => {
                warn!(manifest = %operand.manifest, index = index, error = %err, "Skipping undecodable block");
                continue;
            }
            Err(err) => return Err(err),
        };
        delete_resource(ctx, &doc.key).await?;
    }
    Ok(())
}

async fn delete_resource(ctx: &Reconciler, key: &ResourceKey) -> Result<(), ReconcilerError> {
    let live = match ctx.store.get(key).await {
        Ok(live) => live,
        Err(e) if e.is_not_found() => {
            debug!(resource = %key, "Already deleted");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let terminating = live.metadata.deletion_timestamp.is_some();

    strip_finalizer(ctx, key, live).await?;

    if !terminating {
        match ctx.store.delete(key).await {
            Ok(()) => {
                info!(
                    kind = key.kind(),
                    namespace = key.namespace.as_deref().unwrap_or_default(),
                    name = %key.name,
                    "Deleted resource"
                );
                metrics::increment_resources_deleted(key.kind());
            }
            Err(e) if e.is_absent() => {
                debug!(resource = %key, "Already deleted");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    wait_for_removal(ctx, key).await
}

/// A resource held by someone else's finalizer is still there after delete
async fn wait_for_removal(ctx: &Reconciler, key: &ResourceKey) -> Result<(), ReconcilerError> {
    match ctx.store.get(key).await {
        Ok(_) => {
            info!(resource = %key, "Resource still terminating, retrying later");
            Err(ReconcilerError::TeardownPending {
                resource: key.to_string(),
            })
        }
        Err(e) if e.is_absent() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Drop our finalizer from `live` so its deletion cannot wait on us
async fn strip_finalizer(
    ctx: &Reconciler,
    key: &ResourceKey,
    mut live: DynamicObject,
) -> Result<(), ReconcilerError> {
    if !remove_finalizer(&mut live.metadata, FINALIZER) {
        return Ok(());
    }
    debug!(resource = %key, "Removing finalizer before delete");
    match ctx.store.update(key, &live).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_absent() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

//! # Per-Kind Reconcilers
//!
//! One create-or-patch function per managed kind. All of them go through
//! [`apply`], which owns the parts common to every kind:
//!
//! - the controller reference to the `OperatorConfig`, refreshed every pass
//! - labels and annotations, replaced wholesale only when the template has some
//!
//! The kind functions only decide which spec fields are ours.

use super::ownership::set_controller_reference;
use super::types::{Reconciler, ReconcilerError};
use crate::controller::operand::Operand;
use crate::controller::store::{create_or_patch, OperationResult, ResourceKey};
use crate::crd::{ClusterTask, ConsolePlugin, OperatorConfig};
use crate::observability::metrics;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

/// Create or patch `key`, with `mutate(obj, creating)` filling in the spec
async fn apply<K, F>(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template_meta: &ObjectMeta,
    mut mutate: F,
) -> Result<OperationResult, ReconcilerError>
where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Send,
    F: FnMut(&mut K, bool) + Send,
{
    // Empty sections mean "not managed", not "clear"
    let labels = template_meta.labels.clone().filter(|l| !l.is_empty());
    let annotations = template_meta.annotations.clone().filter(|a| !a.is_empty());

    let result = create_or_patch::<K, _, ReconcilerError>(ctx.store.as_ref(), key, |obj| {
        let creating = obj.meta().creation_timestamp.is_none();
        set_controller_reference(owner, obj.meta_mut())?;
        mutate(obj, creating);

        let meta = obj.meta_mut();
        if let Some(labels) = &labels {
            meta.labels = Some(labels.clone());
        }
        if let Some(annotations) = &annotations {
            meta.annotations = Some(annotations.clone());
        }
        Ok(())
    })
    .await?;

    info!(
        kind = key.kind(),
        namespace = key.namespace.as_deref().unwrap_or_default(),
        name = %key.name,
        operation = %result,
        "Reconciled resource"
    );
    metrics::increment_resources_applied(key.kind(), result.as_str());
    Ok(result)
}

/// Pod template copied whole, selector only on creation, every container
/// running the operand image. Replicas and strategy stay with the cluster.
pub async fn deployment(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template: Deployment,
    operand: &Operand,
) -> Result<OperationResult, ReconcilerError> {
    let image = operand.resolve_image();
    let desired = template.spec.unwrap_or_default();

    apply::<Deployment, _>(ctx, owner, key, &template.metadata, |obj, creating| {
        let spec = obj.spec.get_or_insert_with(Default::default);
        if creating {
            spec.selector = desired.selector.clone();
        }
        spec.template = desired.template.clone();
        if let Some(pod) = spec.template.spec.as_mut() {
            for container in &mut pod.containers {
                container.image = Some(image.clone());
            }
        }
    })
    .await
}

pub async fn service(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template: Service,
) -> Result<OperationResult, ReconcilerError> {
    let desired = template.spec.unwrap_or_default();

    apply::<Service, _>(ctx, owner, key, &template.metadata, |obj, creating| {
        let mut spec = desired.clone();
        if !creating {
            if let Some(live) = obj.spec.as_ref() {
                keep_cluster_assigned(live, &mut spec);
            }
        }
        obj.spec = Some(spec);
    })
    .await
}

/// Carry over what the API server allocated when the template leaves it unset
fn keep_cluster_assigned(live: &ServiceSpec, desired: &mut ServiceSpec) {
    if desired.cluster_ip.is_none() {
        desired.cluster_ip.clone_from(&live.cluster_ip);
    }
    if desired.cluster_ips.is_none() {
        desired.cluster_ips.clone_from(&live.cluster_ips);
    }
    if desired.ip_families.is_none() {
        desired.ip_families.clone_from(&live.ip_families);
    }
    if desired.ip_family_policy.is_none() {
        desired.ip_family_policy.clone_from(&live.ip_family_policy);
    }

    let (Some(ports), Some(live_ports)) = (desired.ports.as_mut(), live.ports.as_ref()) else {
        return;
    };
    for port in ports.iter_mut().filter(|p| p.node_port.is_none()) {
        port.node_port = live_ports
            .iter()
            .find(|lp| lp.name == port.name && lp.port == port.port)
            .and_then(|lp| lp.node_port);
    }
}

pub async fn config_map(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template: ConfigMap,
) -> Result<OperationResult, ReconcilerError> {
    apply::<ConfigMap, _>(ctx, owner, key, &template.metadata, |obj, _| {
        obj.data.clone_from(&template.data);
        obj.binary_data.clone_from(&template.binary_data);
    })
    .await
}

pub async fn cluster_task(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template: ClusterTask,
    operand: &Operand,
) -> Result<OperationResult, ReconcilerError> {
    let image = operand.resolve_image();

    apply::<ClusterTask, _>(ctx, owner, key, &template.metadata, |obj, _| {
        obj.spec = template.spec.clone();
        for step in &mut obj.spec.steps {
            step.image = Some(image.clone());
        }
    })
    .await
}

pub async fn console_plugin(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    key: &ResourceKey,
    template: ConsolePlugin,
) -> Result<OperationResult, ReconcilerError> {
    apply::<ConsolePlugin, _>(ctx, owner, key, &template.metadata, |obj, _| {
        obj.spec = template.spec.clone();
    })
    .await
}

//! # Kind Dispatch
//!
//! Classifies manifest documents by (group, version, kind) and routes each to
//! the reconciler for that kind. The table is closed: anything outside it is
//! an `UnsupportedKind` error.

use super::kinds;
use super::types::{Reconciler, ReconcilerError};
use crate::controller::manifest::is_blank;
use crate::controller::operand::Operand;
use crate::controller::store::{OperationResult, ResourceKey};
use crate::crd::{ClusterTask, ConsolePlugin, OperatorConfig};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use kube::core::GroupVersionKind;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

/// The kinds the operator knows how to reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    Deployment,
    Service,
    ConfigMap,
    ClusterTask,
    ConsolePlugin,
}

impl ManagedKind {
    pub const ALL: [ManagedKind; 5] = [
        ManagedKind::Deployment,
        ManagedKind::Service,
        ManagedKind::ConfigMap,
        ManagedKind::ClusterTask,
        ManagedKind::ConsolePlugin,
    ];

    #[must_use]
    pub fn gvk(self) -> GroupVersionKind {
        match self {
            ManagedKind::Deployment => gvk_of::<Deployment>(),
            ManagedKind::Service => gvk_of::<Service>(),
            ManagedKind::ConfigMap => gvk_of::<ConfigMap>(),
            ManagedKind::ClusterTask => gvk_of::<ClusterTask>(),
            ManagedKind::ConsolePlugin => gvk_of::<ConsolePlugin>(),
        }
    }

    #[must_use]
    pub fn is_namespaced(self) -> bool {
        matches!(
            self,
            ManagedKind::Deployment | ManagedKind::Service | ManagedKind::ConfigMap
        )
    }

    /// Look up a kind by its full `apiVersion` and `kind`
    #[must_use]
    pub fn from_type_meta(api_version: &str, kind: &str) -> Option<Self> {
        let (group, version) = match api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self::ALL.into_iter().find(|managed| {
            let gvk = managed.gvk();
            gvk.group == group && gvk.version == version && gvk.kind == kind
        })
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ManagedKind::Deployment => "Deployment",
            ManagedKind::Service => "Service",
            ManagedKind::ConfigMap => "ConfigMap",
            ManagedKind::ClusterTask => "ClusterTask",
            ManagedKind::ConsolePlugin => "ConsolePlugin",
        }
    }

    /// Store key for a resource of this kind.
    /// Namespaced kinds fall back to `install_namespace`; cluster-scoped kinds
    /// ignore any namespace in the template.
    #[must_use]
    pub fn key(
        self,
        name: &str,
        namespace: Option<&str>,
        install_namespace: &str,
    ) -> ResourceKey {
        let namespace = self.is_namespaced().then(|| {
            namespace
                .filter(|ns| !ns.is_empty())
                .unwrap_or(install_namespace)
                .to_string()
        });
        ResourceKey::new(self.gvk(), namespace, name)
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn gvk_of<K: Resource<DynamicType = ()>>() -> GroupVersionKind {
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Just enough of a document to classify and address it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentHeader {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: HeaderMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeaderMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// A manifest document classified against the kind table
#[derive(Debug, Clone)]
pub struct ClassifiedDocument {
    pub index: usize,
    pub kind: ManagedKind,
    pub key: ResourceKey,
}

/// Decode a block's header without touching the rest of it
pub fn decode_header(
    manifest: &str,
    index: usize,
    block: &str,
) -> Result<DocumentHeader, ReconcilerError> {
    serde_yaml::from_str(block).map_err(|source| ReconcilerError::Decode {
        manifest: manifest.to_string(),
        index,
        source,
    })
}

/// Classify a block and compute its store key
pub fn classify(
    manifest: &str,
    index: usize,
    block: &str,
    install_namespace: &str,
) -> Result<ClassifiedDocument, ReconcilerError> {
    let header = decode_header(manifest, index, block)?;
    let kind = ManagedKind::from_type_meta(&header.api_version, &header.kind).ok_or_else(|| {
        ReconcilerError::UnsupportedKind {
            manifest: manifest.to_string(),
            api_version: header.api_version.clone(),
            kind: header.kind.clone(),
        }
    })?;
    let name = header
        .metadata
        .name
        .as_deref()
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ReconcilerError::MissingName {
            manifest: manifest.to_string(),
            index,
        })?;
    let key = kind.key(name, header.metadata.namespace.as_deref(), install_namespace);
    Ok(ClassifiedDocument { index, kind, key })
}

fn decode<K: DeserializeOwned>(
    manifest: &str,
    index: usize,
    block: &str,
) -> Result<K, ReconcilerError> {
    serde_yaml::from_str(block).map_err(|source| ReconcilerError::Decode {
        manifest: manifest.to_string(),
        index,
        source,
    })
}

/// Reconcile every document of an operand's bundle, in file order.
/// Stops at the first failing document; earlier documents stay applied.
pub async fn reconcile_operand(
    ctx: &Reconciler,
    owner: &OperatorConfig,
    operand: &Operand,
) -> Result<Vec<(ResourceKey, OperationResult)>, ReconcilerError> {
    let blocks = ctx.manifests.load(&operand.manifest).await?;
    let mut applied = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        if is_blank(block) {
            continue;
        }
        let doc = classify(&operand.manifest, index, block, &ctx.install_namespace)?;
        let manifest = operand.manifest.as_str();

        let result = match doc.kind {
            ManagedKind::Deployment => {
                let template = decode(manifest, index, block)?;
                kinds::deployment(ctx, owner, &doc.key, template, operand).await?
            }
            ManagedKind::Service => {
                let template = decode(manifest, index, block)?;
                kinds::service(ctx, owner, &doc.key, template).await?
            }
            ManagedKind::ConfigMap => {
                let template = decode(manifest, index, block)?;
                kinds::config_map(ctx, owner, &doc.key, template).await?
            }
            ManagedKind::ClusterTask => {
                let template = decode(manifest, index, block)?;
                kinds::cluster_task(ctx, owner, &doc.key, template, operand).await?
            }
            ManagedKind::ConsolePlugin => {
                let template = decode(manifest, index, block)?;
                kinds::console_plugin(ctx, owner, &doc.key, template).await?
            }
        };
        applied.push((doc.key, result));
    }

    Ok(applied)
}

//! # Operand Kinds
//!
//! Typed views of the third-party kinds shipped in the operand bundles.
//!
//! The operator does not own these CRDs, so the views only model the fields it
//! writes (step images). Everything else round-trips untouched through the
//! flattened `rest` maps.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Tekton `ClusterTask` (cluster-scoped pipeline task)
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    kind = "ClusterTask",
    group = "tekton.dev",
    version = "v1beta1",
    schema = "disabled"
)]
pub struct ClusterTaskSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// A single step of a `ClusterTask`
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// OpenShift console dynamic plugin registration
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    kind = "ConsolePlugin",
    group = "console.openshift.io",
    version = "v1alpha1",
    schema = "disabled"
)]
pub struct ConsolePluginSpec {
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

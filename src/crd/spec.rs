//! # OperatorConfig Spec
//!
//! The singleton configuration object. Its presence, name and deletion marker
//! drive the whole operand lifecycle; the spec itself carries no settings yet.

use crate::crd::status::OperatorConfigStatus;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// OperatorConfig Custom Resource Definition
///
/// Only one instance per cluster is acted on, and it must carry the configured
/// owner name (`openshift-migration` by default).
///
/// # Example
///
/// ```yaml
/// apiVersion: crane.konveyor.io/v1alpha1
/// kind: OperatorConfig
/// metadata:
///   name: openshift-migration
/// spec: {}
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "OperatorConfig",
    group = "crane.konveyor.io",
    version = "v1alpha1",
    status = "OperatorConfigStatus",
    printcolumn = r#"{"name":"InvalidName", "type":"string", "jsonPath":".status.conditions[?(@.type==\"InvalidName\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
#[allow(
    clippy::empty_structs_with_brackets,
    reason = "CustomResource derive needs a braced spec struct"
)]
pub struct OperatorConfigSpec {}

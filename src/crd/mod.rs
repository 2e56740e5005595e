//! # Custom Resource Definitions
//!
//! Resource types for the Crane operator.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The `OperatorConfig` custom resource driving reconciliation
//! - `status.rs` - Status and condition types for `OperatorConfig`
//! - `operands.rs` - Typed views of the third-party kinds the operator manages
//!   (Tekton `ClusterTask`, OpenShift `ConsolePlugin`)

mod operands;
mod spec;
mod status;

// Re-export all public types
pub use operands::{ClusterTask, ClusterTaskSpec, ConsolePlugin, ConsolePluginSpec, Step};
pub use spec::{OperatorConfig, OperatorConfigSpec};
pub use status::{Condition, OperatorConfigStatus};

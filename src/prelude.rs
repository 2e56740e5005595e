//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use crane_operator::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, ManagedKind, ReconcileOutcome, Reconciler, ReconcilerError,
};

// Operands and images
pub use crate::controller::images::{Component, ImageEnvStrategy, ImageResolver};
pub use crate::controller::manifest::{ManifestError, ManifestSource};
pub use crate::controller::operand::{Operand, OperandCatalog};

// Object store
pub use crate::controller::store::{
    KubeStore, MemoryStore, ObjectStore, OperationResult, ResourceKey, StoreError,
};

pub use crate::config::ControllerConfig;

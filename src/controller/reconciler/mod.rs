//! # Reconciler
//!
//! Manifest-driven reconciliation of the Crane operands on behalf of the
//! singleton `OperatorConfig`.
//!
//! ## Reconciliation Flow
//!
//! 1. Fetch the `OperatorConfig`; stop if it is gone
//! 2. Validate its name and report it through the `InvalidName` condition
//! 3. Attach the finalizer (and requeue) before anything else is created
//! 4. On deletion, tear down every operand, then release the finalizer
//! 5. Otherwise load each operand bundle in catalog order, classify every
//!    document by kind and create-or-patch it with the operand image and an
//!    owner reference back to the `OperatorConfig`
//!
//! ## Module Structure
//!
//! - `types.rs` - Context, errors and outcomes
//! - `lifecycle.rs` - The per-pass state machine
//! - `dispatch.rs` - Kind table and document classification
//! - `kinds.rs` - Create-or-patch per managed kind
//! - `ownership.rs` - Owner references and finalizers
//! - `conditions.rs` - Status condition upserts
//! - `teardown.rs` - Finalizer-gated deletion of operands

pub mod conditions;
pub mod dispatch;
pub mod kinds;
pub mod lifecycle;
pub mod ownership;
pub mod teardown;
pub mod types;

// Re-export public API
pub use dispatch::{classify, reconcile_operand, ClassifiedDocument, ManagedKind};
pub use lifecycle::reconcile;
pub use teardown::teardown;
pub use types::{BackoffState, LifecycleState, ReconcileOutcome, Reconciler, ReconcilerError};

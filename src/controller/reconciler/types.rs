//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::constants::{DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::manifest::{ManifestError, ManifestSource};
use crate::controller::operand::OperandCatalog;
use crate::controller::store::{ObjectStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    ManifestUnreadable(#[from] ManifestError),

    #[error(
        "Kind {kind} ({api_version}) in {manifest} is not managed by the operator, check input yamls and make sure all the input are in desired state"
    )]
    UnsupportedKind {
        manifest: String,
        api_version: String,
        kind: String,
    },

    #[error("Failed to decode document {index} of {manifest}: {source}")]
    Decode {
        manifest: String,
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Document {index} of {manifest} has no metadata.name")]
    MissingName { manifest: String, index: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{resource} is already controlled by {owner}")]
    AlreadyOwned { resource: String, owner: String },

    #[error("OperatorConfig {0} has no uid, cannot own resources")]
    OwnerWithoutUid(String),

    #[error("Teardown of {manifest} failed: {source}")]
    Teardown {
        manifest: String,
        #[source]
        source: Box<ReconcilerError>,
    },

    #[error("{resource} is still terminating")]
    TeardownPending { resource: String },
}

impl ReconcilerError {
    /// Short label for metrics and logs
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ReconcilerError::ManifestUnreadable(_) => "manifest-unreadable",
            ReconcilerError::UnsupportedKind { .. } => "unsupported-kind",
            ReconcilerError::Decode { .. } | ReconcilerError::MissingName { .. } => "decode",
            ReconcilerError::Store(_) => "store",
            ReconcilerError::AlreadyOwned { .. } | ReconcilerError::OwnerWithoutUid(_) => {
                "ownership"
            }
            ReconcilerError::Teardown { .. } => "teardown",
            ReconcilerError::TeardownPending { .. } => "teardown-pending",
        }
    }
}

/// What the scheduler should do after a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged, wait for the next change
    Done,
    /// Run again shortly (finalizer just attached)
    Requeue,
}

/// Where an `OperatorConfig` sits in its lifecycle for one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    NameInvalid,
    Active,
    Terminating,
    Gone,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::NameInvalid => "name-invalid",
            LifecycleState::Active => "active",
            LifecycleState::Terminating => "terminating",
            LifecycleState::Gone => "gone",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Reconciler context shared by every pass
#[derive(Clone)]
pub struct Reconciler {
    pub store: Arc<dyn ObjectStore>,
    pub manifests: ManifestSource,
    pub catalog: OperandCatalog,
    /// The only `OperatorConfig` name acted on
    pub owner_name: String,
    /// Namespace for namespaced operands whose template has none
    pub install_namespace: String,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    // Backoff state per OperatorConfig name, driven from error_policy()
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("manifests", &self.manifests)
            .field("catalog", &self.catalog)
            .field("owner_name", &self.owner_name)
            .field("install_namespace", &self.install_namespace)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        manifests: ManifestSource,
        catalog: OperandCatalog,
        owner_name: impl Into<String>,
        install_namespace: impl Into<String>,
    ) -> Self {
        Self {
            store,
            manifests,
            catalog,
            owner_name: owner_name.into(),
            install_namespace: install_namespace.into(),
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Build from operator configuration
    pub fn from_config(
        store: Arc<dyn ObjectStore>,
        catalog: OperandCatalog,
        config: &ControllerConfig,
    ) -> Self {
        Self {
            backoff_min_secs: config.backoff_min_secs,
            backoff_max_secs: config.backoff_max_secs,
            ..Self::new(
                store,
                ManifestSource::new(config.manifest_dir.clone()),
                catalog,
                config.owner_config_name.clone(),
                config.install_namespace.clone(),
            )
        }
    }

    /// Forget accumulated errors for a resource after a clean pass.
    /// Returns whether the resource had been backing off.
    pub fn reset_backoff(&self, name: &str) -> bool {
        match self.backoff_states.lock() {
            Ok(mut states) => states.get_mut(name).is_some_and(|state| {
                let had_errors = state.error_count > 0;
                state.reset();
                had_errors
            }),
            Err(_) => false,
        }
    }
}

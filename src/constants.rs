//! # Constants
//!
//! Shared constants used throughout the operator.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Finalizer placed on the `OperatorConfig` until every operand is torn down
pub const FINALIZER: &str = "openshift.konveyor.crane";

/// The only `OperatorConfig` name the operator acts on
pub const DEFAULT_OWNER_CONFIG_NAME: &str = "openshift-migration";

/// Namespace namespaced operands land in when their template has none
pub const DEFAULT_INSTALL_NAMESPACE: &str = "openshift-migration";

/// Directory holding the operand manifest bundles
pub const DEFAULT_MANIFEST_DIR: &str = "manifests";

/// Condition type reporting a wrongly named `OperatorConfig`
pub const INVALID_NAME_CONDITION_TYPE: &str = "InvalidName";

/// Reason used when the `OperatorConfig` carries a non-standard name
pub const REASON_NON_STANDARD_NAME: &str = "NonStandardNameConfigured";

/// Reason used when the `OperatorConfig` carries the standard name
pub const REASON_STANDARD_NAME: &str = "StandardNameFound";

/// Field manager name used for writes
pub const FIELD_MANAGER: &str = "crane-operator";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue delay after the finalizer has been attached (seconds)
pub const REQUEUE_AFTER_FINALIZER_SECS: u64 = 1;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// How many times create-or-patch re-reads after losing a create race
pub const CREATE_OR_PATCH_ATTEMPTS: usize = 3;

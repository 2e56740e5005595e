//! # Runtime
//!
//! Process-level wiring around the reconciler.
//!
//! - `initialization`: tracing, metrics, probe server and client setup
//! - `watch_loop`: the kube-runtime controller and its restart loop
//! - `error_policy`: requeue backoff and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

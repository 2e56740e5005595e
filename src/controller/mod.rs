//! # Controller
//!
//! Core modules of the Crane operator.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `images`: Operand image resolution from the environment
//! - `manifest`: Operand bundle loading and document splitting
//! - `operand`: The operand catalog
//! - `reconciler`: Core reconciliation logic
//! - `server`: HTTP server for metrics and health checks
//! - `store`: Object store seam (API server or in-memory)
//!
//! The `crdgen` binary lives alongside these modules but is not part of the
//! library.

pub mod backoff;
pub mod images;
pub mod manifest;
pub mod operand;
pub mod reconciler;
pub mod server;
pub mod store;

//! Crane Operator Library
//!
//! Installs and reconciles the Crane operands (reverse proxy, secret service,
//! console UI plugin, runner tasks) on behalf of a singleton `OperatorConfig`.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use crane_operator::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;

//! # OperatorConfig Status
//!
//! Status types for reporting conditions on the `OperatorConfig`.

use serde::{Deserialize, Serialize};

/// Status of the OperatorConfig resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfigStatus {
    /// Conditions represent the latest available observations.
    /// At most one entry per condition type.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Condition
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (e.g. "InvalidName")
    pub r#type: String,
    /// "True", "False" or "Unknown"
    pub status: String,
    /// RFC3339 time of the last status change
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

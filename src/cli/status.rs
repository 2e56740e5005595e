//! # Status Command
//!
//! Shows conditions and finalizers of an `OperatorConfig`.

use anyhow::{Context, Result};
use crane_operator::constants::{DEFAULT_OWNER_CONFIG_NAME, FINALIZER};
use crane_operator::crd::OperatorConfig;
use kube::{api::Api, Client};

/// Show status of a cluster-scoped OperatorConfig
pub async fn status_command(client: Client, name: String) -> Result<()> {
    println!("📊 Status for OperatorConfig '{name}'");
    println!();

    let api: Api<OperatorConfig> = Api::all(client);

    let config = api
        .get(&name)
        .await
        .with_context(|| format!("Failed to get OperatorConfig '{name}'"))?;

    println!("Resource Information:");
    println!(
        "  Name: {}",
        config.metadata.name.as_deref().unwrap_or("<unknown>")
    );
    if let Some(uid) = &config.metadata.uid {
        println!("  UID: {}", uid);
    }
    if name != DEFAULT_OWNER_CONFIG_NAME {
        println!("  ⚠ Only '{DEFAULT_OWNER_CONFIG_NAME}' is reconciled by a default deployment");
    }
    if config.metadata.deletion_timestamp.is_some() {
        println!("  Deleting: true");
    }

    println!();
    println!("Finalizers:");
    let finalizers = config.metadata.finalizers.as_deref().unwrap_or_default();
    if finalizers.is_empty() {
        println!("  <none>");
    }
    for finalizer in finalizers {
        let marker = if finalizer == FINALIZER { " (operator)" } else { "" };
        println!("  {finalizer}{marker}");
    }

    match config.status.as_ref().filter(|s| !s.conditions.is_empty()) {
        Some(status) => {
            println!();
            println!("Conditions:");
            for condition in &status.conditions {
                println!("  {}: {}", condition.r#type, condition.status);
                if let Some(reason) = &condition.reason {
                    println!("    Reason: {}", reason);
                }
                if let Some(message) = &condition.message {
                    println!("    Message: {}", message);
                }
                if let Some(last_transition_time) = &condition.last_transition_time {
                    println!("    Last Transition: {}", last_transition_time);
                }
            }
        }
        None => {
            println!();
            println!("Status: No conditions reported (resource may not have been reconciled yet)");
        }
    }

    Ok(())
}

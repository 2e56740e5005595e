//! # CRD Generator
//!
//! Generates the `OperatorConfig` CustomResourceDefinition YAML from the Rust
//! type definition.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/operatorconfig.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```
//!
//! The generated CRD is cluster-scoped with a status subresource holding the
//! condition list.

use crane_operator::crd::OperatorConfig;
use kube::core::CustomResourceExt;

fn main() {
    let crd = OperatorConfig::crd();

    match serde_yaml::to_string(&crd) {
        Ok(yaml) => {
            println!("# This file is auto-generated by crdgen");
            println!("# DO NOT EDIT THIS FILE MANUALLY");
            println!("# Change the Rust types in src/crd/ instead");
            println!("#");
            println!("---");
            print!("{yaml}");
        }
        Err(e) => {
            eprintln!("Failed to serialize CRD to YAML: {e}");
            std::process::exit(1);
        }
    }
}

//! # cranectl
//!
//! Command-line helper for the Crane operator.
//!
//! ## Usage
//!
//! ```bash
//! # Classify every operand bundle offline
//! cranectl check --manifest-dir ./manifests
//!
//! # Show the image each operand resolves to
//! cranectl images --strategy related-image
//!
//! # Show conditions and finalizers of the OperatorConfig
//! cranectl status
//! cranectl status my-config
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crane_operator::constants::{
    DEFAULT_INSTALL_NAMESPACE, DEFAULT_MANIFEST_DIR, DEFAULT_OWNER_CONFIG_NAME,
};
use crane_operator::controller::images::ImageEnvStrategy;
use kube::Client;
use std::path::PathBuf;

mod check;
mod images;
mod status;

/// Crane operator CLI
#[derive(Parser)]
#[command(name = "cranectl")]
#[command(
    about = "Crane operator CLI",
    long_about = None,
    after_help = "\
Examples:
  cranectl check --manifest-dir ./manifests
  cranectl images --strategy related-image
  cranectl status openshift-migration
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and classify every operand bundle without touching a cluster
    Check {
        /// Directory holding the operand bundles
        #[arg(long, default_value = DEFAULT_MANIFEST_DIR)]
        manifest_dir: PathBuf,

        /// Namespace applied to namespaced documents without one
        #[arg(long, default_value = DEFAULT_INSTALL_NAMESPACE)]
        install_namespace: String,
    },
    /// Print the image every operand resolves to
    Images {
        /// Image environment convention (direct or related-image).
        /// Defaults to IMAGE_ENV_STRATEGY, then direct.
        #[arg(long)]
        strategy: Option<ImageEnvStrategy>,
    },
    /// Show conditions and finalizers of an OperatorConfig
    Status {
        /// Name of the OperatorConfig resource
        #[arg(value_name = "NAME", default_value = DEFAULT_OWNER_CONFIG_NAME)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must happen before any client is built
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cranectl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            manifest_dir,
            install_namespace,
        } => check::check_command(manifest_dir, install_namespace).await,
        Commands::Images { strategy } => {
            let strategy = match strategy {
                Some(strategy) => strategy,
                None => match std::env::var("IMAGE_ENV_STRATEGY") {
                    Ok(raw) => raw
                        .parse()
                        .map_err(|e: String| anyhow::anyhow!(e))
                        .context("Invalid IMAGE_ENV_STRATEGY")?,
                    Err(_) => ImageEnvStrategy::default(),
                },
            };
            images::images_command(strategy);
            Ok(())
        }
        Commands::Status { name } => {
            let client = Client::try_default()
                .await
                .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;
            status::status_command(client, name).await
        }
    }
}

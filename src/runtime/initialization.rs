//! # Initialization
//!
//! Operator start-up: rustls provider, tracing, metrics, the probe server,
//! the Kubernetes client and the reconciler context.

use crate::config::ControllerConfig;
use crate::controller::images::ImageResolver;
use crate::controller::operand::OperandCatalog;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::KubeStore;
use crate::crd::OperatorConfig;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, Client};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Everything the watch loop needs
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// API for the cluster-scoped `OperatorConfig`
    pub configs: Api<OperatorConfig>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = ControllerConfig::from_env();
    init_tracing(&config)?;

    info!("Starting Crane operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        owner = %config.owner_config_name,
        namespace = %config.install_namespace,
        manifest_dir = %config.manifest_dir.display(),
        image_strategy = %config.image_env_strategy,
        "Loaded configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    // Start server in background task, wait for it to bind before proceeding
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let configs: Api<OperatorConfig> = Api::all(client.clone());

    let resolver = Arc::new(ImageResolver::from_env(config.image_env_strategy));
    let reconciler = Arc::new(Reconciler::from_config(
        Arc::new(KubeStore::new(client.clone())),
        OperandCatalog::crane(resolver),
        &config,
    ));

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        client,
        configs,
        reconciler,
        server_state,
        config,
    })
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` applies to this crate
fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("crane_operator={}", config.log_level.to_lowercase()).into()
    });

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = config.server_startup_timeout();
    let poll_interval = config.server_poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        // Set by start_server once bound
        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

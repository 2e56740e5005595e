//! # Controller Configuration
//!
//! Operator-level settings loaded from environment variables.

use crate::controller::images::ImageEnvStrategy;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from the operator Deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// The single `OperatorConfig` name the operator acts on
    pub owner_config_name: String,
    /// Namespace for namespaced operands whose template has no namespace
    pub install_namespace: String,
    /// Directory the operand manifest bundles are read from
    pub manifest_dir: PathBuf,
    /// Which environment variable convention resolves operand images
    pub image_env_strategy: ImageEnvStrategy,
    /// HTTP server port for metrics and probes
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// HTTP server readiness poll interval (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Minimum error backoff (seconds)
    pub backoff_min_secs: u64,
    /// Maximum error backoff (seconds)
    pub backoff_max_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Watch ClusterTasks and ConsolePlugins as owned resources.
    /// Disable on clusters without the Tekton or console CRDs installed.
    pub watch_optional_kinds: bool,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            owner_config_name: DEFAULT_OWNER_CONFIG_NAME.to_string(),
            install_namespace: DEFAULT_INSTALL_NAMESPACE.to_string(),
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
            image_env_strategy: ImageEnvStrategy::Direct,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            watch_optional_kinds: true,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;

        let image_env_strategy = match std::env::var("IMAGE_ENV_STRATEGY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Ignoring IMAGE_ENV_STRATEGY: {e}, falling back to direct");
                ImageEnvStrategy::Direct
            }),
            Err(_) => ImageEnvStrategy::Direct,
        };

        Self {
            owner_config_name: env_var_or_default_str(
                "OWNER_CONFIG_NAME",
                DEFAULT_OWNER_CONFIG_NAME,
            ),
            install_namespace: env_var_or_default_str(
                "INSTALL_NAMESPACE",
                DEFAULT_INSTALL_NAMESPACE,
            ),
            manifest_dir: PathBuf::from(env_var_or_default_str(
                "MANIFEST_DIR",
                DEFAULT_MANIFEST_DIR,
            )),
            image_env_strategy,
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            watch_optional_kinds: env_var_or_default_bool("WATCH_OPTIONAL_KINDS", true),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get watch restart delay after end duration
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// Get HTTP server startup timeout
    pub fn server_startup_timeout(&self) -> Duration {
        Duration::from_secs(self.server_startup_timeout_secs)
    }

    /// Get HTTP server readiness poll interval
    pub fn server_poll_interval(&self) -> Duration {
        Duration::from_millis(self.server_poll_interval_ms)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_standard_names() {
        let config = ControllerConfig::default();
        assert_eq!(config.owner_config_name, "openshift-migration");
        assert_eq!(config.install_namespace, "openshift-migration");
        assert_eq!(config.manifest_dir, PathBuf::from("manifests"));
        assert_eq!(config.image_env_strategy, ImageEnvStrategy::Direct);
        assert!(config.watch_optional_kinds);
    }

    #[test]
    fn test_duration_helpers() {
        let config = ControllerConfig {
            server_poll_interval_ms: 250,
            watch_restart_delay_after_end_secs: 3,
            ..ControllerConfig::default()
        };
        assert_eq!(config.server_poll_interval(), Duration::from_millis(250));
        assert_eq!(
            config.watch_restart_delay_after_end_duration(),
            Duration::from_secs(3)
        );
    }
}

use std::path::PathBuf;

use clap::Parser;
use error_stack::Report;
use utils::logging::Severity;
use utils::version;

use crate::config::ConfigError;
use crate::k8s::LabelMatcher;

/// Watches pod deletions and resets redis sentinels so they rediscover the master.
#[derive(Parser, Debug, Clone)]
#[command(about, long_about, version = version::VERSION)]
pub struct WatcherArgs {
    #[arg(
        long,
        env = "K8SBASE",
        help = "Base URL of the Kubernetes API, e.g. http://127.0.0.1:8000 (defaults to kubeconfig or in-cluster config)"
    )]
    pub k8s_base: Option<String>,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file, used when no API base URL is given"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    #[arg(
        long,
        env = "WATCH_APP",
        default_value = "redis-ha",
        help = "Value of the `app` label of monitored pods"
    )]
    pub watch_app: String,

    #[arg(
        long,
        env = "WATCH_RELEASE",
        default_value = "",
        help = "Value of the `release` label of monitored pods (empty matches any release)"
    )]
    pub watch_release: String,

    #[arg(
        long,
        env = "WATCH_ROLES",
        value_delimiter = ',',
        default_value = "sentinel,slave",
        help = "Comma-separated `role` label values whose deletion triggers a reset"
    )]
    pub watch_roles: Vec<String>,

    #[arg(
        long,
        env = "LOG_LEVEL",
        default_value = "INFO",
        help = "One of DEBUG, INFO, WARN, ERROR; unknown values fall back to INFO"
    )]
    pub log_level: String,

    #[arg(
        long,
        env = "REDIS_SENTINEL_HOST",
        default_value = "redis-sentinel",
        help = "Name of the sentinel service whose endpoints are reset"
    )]
    pub sentinel_service: String,

    #[arg(
        long,
        env = "REDIS_SENTINEL_PORT",
        default_value_t = 26379,
        help = "Sentinel port used when the service endpoints carry none"
    )]
    pub sentinel_port: u16,

    #[arg(long, env = "REDIS_MASTER", default_value = "mymaster")]
    pub master_name: String,

    #[arg(
        long,
        env = "RESET_CMD",
        value_hint = clap::ValueHint::ExecutablePath,
        default_value = "/usr/bin/redis-cli"
    )]
    pub reset_command: PathBuf,
}

impl WatcherArgs {
    pub fn severity(&self) -> Severity {
        Severity::parse_lossy(&self.log_level)
    }

    /// Monitored roles with blanks removed.
    pub fn roles(&self) -> Vec<String> {
        self.watch_roles
            .iter()
            .map(|role| role.trim())
            .filter(|role| !role.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn label_matcher(&self) -> LabelMatcher {
        LabelMatcher::new(&self.watch_app, &self.watch_release, self.roles())
    }

    /// Rejects configurations the watcher cannot run with.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Invalid`] for an empty namespace, service, master or role list
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        let invalid = |message: &str| -> Result<(), Report<ConfigError>> {
            Err(Report::new(ConfigError::Invalid {
                message: message.to_string(),
            }))
        };

        if self.namespace.trim().is_empty() {
            return invalid("namespace must not be empty");
        }
        if self.roles().is_empty() {
            return invalid("at least one watched role is required");
        }
        if self.sentinel_service.trim().is_empty() {
            return invalid("sentinel service name must not be empty");
        }
        if self.master_name.trim().is_empty() {
            return invalid("master name must not be empty");
        }
        Ok(())
    }
}

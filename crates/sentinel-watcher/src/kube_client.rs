use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;

use crate::k8s::KubernetesError;

/// Builds the API client.
///
/// An explicit `api_base` (e.g. a `kubectl proxy` address) wins over the
/// kubeconfig file, which wins over the default in-cluster / `~/.kube/config`
/// resolution.
pub async fn init_kube_client(
    api_base: Option<&str>,
    kubeconfig: Option<PathBuf>,
    namespace: &str,
) -> Result<Client, Report<KubernetesError>> {
    let client = match (api_base, kubeconfig) {
        (Some(api_base), _) => {
            let cluster_url = api_base.parse::<http::Uri>().change_context(
                KubernetesError::ConnectionFailed {
                    message: format!("Invalid Kubernetes API base URL: {api_base}"),
                },
            )?;

            let mut config = Config::new(cluster_url);
            config.default_namespace = namespace.to_string();

            Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
                message: format!("Failed to create Kubernetes client for {api_base}"),
            })?
        }
        (None, Some(kubeconfig_path)) => {
            // Load kubeconfig from the specified file
            let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).change_context(
                KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?;

            Client::try_from(config).change_context(KubernetesError::ConnectionFailed {
                message: "Failed to create Kubernetes client from custom kubeconfig".to_string(),
            })?
        }
        (None, None) => {
            // Use default configuration (in-cluster or ~/.kube/config)
            Client::try_default()
                .await
                .change_context(KubernetesError::ConnectionFailed {
                    message: "Failed to create Kubernetes client".to_string(),
                })?
        }
    };
    Ok(client)
}

/// Kubernetes client construction
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::KubeConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds API clients and checks the kubectl toolchain
pub struct KubernetesClient;

impl KubernetesClient {
    /// Build a kube client from an explicit kubeconfig/context, or infer it
    /// from the environment (KUBECONFIG, ~/.kube/config, in-cluster)
    pub async fn connect(config: &KubeConfig) -> Result<Client> {
        let options = KubeConfigOptions {
            context: config.context.clone(),
            ..KubeConfigOptions::default()
        };

        let mut kube_config = match (&config.kubeconfig, &config.context) {
            (Some(path), _) => {
                debug!("Loading kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .context("Failed to load kubeconfig")?
            }
            (None, Some(context)) => {
                debug!("Loading kubeconfig context {}", context);
                Config::from_kubeconfig(&options)
                    .await
                    .context("Failed to load kubeconfig")?
            }
            (None, None) => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };
        kube_config.connect_timeout = Some(CONNECT_TIMEOUT);
        kube_config.read_timeout = Some(READ_TIMEOUT);

        let cluster_url = kube_config.cluster_url.clone();
        let client = Client::try_from(kube_config).context("Failed to create Kubernetes client")?;

        info!("Kubernetes configuration loaded for {}", cluster_url);
        Ok(client)
    }

    /// Check if kubectl is installed
    pub async fn check_kubectl_installed(kubectl: &str) -> Result<()> {
        crate::utils::command::check_tool_installed(
            kubectl,
            &["version", "--client"],
            "https://kubernetes.io/docs/tasks/tools/",
        )
        .await
    }
}

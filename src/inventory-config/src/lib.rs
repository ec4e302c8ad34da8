mod config;
mod error;
mod exec;
mod namespace;
mod pod;
mod provider_file;

pub use config::*;
pub use error::ConfigError;
pub use exec::*;
pub use namespace::*;
pub use pod::*;
pub use provider_file::*;

use tracing::debug;

/// kubeconfig with the context selected from it
#[derive(Debug, Clone, PartialEq)]
pub struct KubeContext {
    pub namespace: String,
    pub api_path: String,
    pub config: KubeConfig,
}

/// where the hub connection settings come from
#[derive(Debug, Clone, PartialEq)]
pub enum K8Config {
    Pod(PodConfig),
    KubeConfig(KubeContext),
}

impl K8Config {
    /// in-cluster config when running in a pod, otherwise the default kubeconfig
    pub fn load() -> Result<Self, ConfigError> {
        match PodConfig::load() {
            Ok(pod) => Ok(Self::Pod(pod)),
            Err(err) => {
                debug!(%err, "not in cluster, loading kubeconfig");
                Self::from_kube_config(KubeConfig::load_default()?)
            }
        }
    }

    pub fn from_kube_config(config: KubeConfig) -> Result<Self, ConfigError> {
        let context = config
            .current_context()
            .ok_or(ConfigError::NoCurrentContext)?;
        let cluster = config.current_cluster().ok_or_else(|| {
            ConfigError::Other(format!(
                "cluster {} of current context not found",
                context.context.cluster
            ))
        })?;
        Ok(Self::KubeConfig(KubeContext {
            namespace: context.context.namespace().to_owned(),
            api_path: cluster.cluster.server.clone(),
            config,
        }))
    }

    pub fn api_path(&self) -> String {
        match self {
            Self::Pod(pod) => pod.api_path(),
            Self::KubeConfig(context) => context.api_path.clone(),
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            Self::Pod(pod) => &pod.namespace,
            Self::KubeConfig(context) => &context.namespace,
        }
    }
}

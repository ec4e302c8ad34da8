use std::fs::read;
use std::sync::Arc;

use tracing::debug;

use inventory_config::K8Config;
use inventory_config::KubeConfig;
use inventory_config::PodConfig;
use inventory_config::UserDetail;
use inventory_types::cluster_profile::CLUSTER_EXEC_EXTENSION_KEY;

use crate::provider::CredentialProvider;
use crate::provider::ExecProvider;
use crate::provider::StaticProvider;
use crate::provider::TokenFileProvider;
use crate::AuthError;
use crate::ClusterDescriptor;
use crate::Credential;
use crate::RestConfig;

const SERVICE_ACCOUNT_PROVIDER: &str = "serviceaccount";
const KUBECONFIG_PROVIDER: &str = "kubeconfig";

impl RestConfig {
    /// hub connection from in-cluster config or the current kubeconfig context
    pub fn from_k8_config(config: &K8Config) -> Result<Self, AuthError> {
        match config {
            K8Config::Pod(pod) => Self::from_pod(pod),
            K8Config::KubeConfig(context) => Self::from_kube_config(&context.config, None),
        }
    }

    pub fn from_pod(pod: &PodConfig) -> Result<Self, AuthError> {
        let ca_path = pod.ca_path();
        debug!(ca = %ca_path.display(), "loading service account CA");
        let mut descriptor = ClusterDescriptor::new(pod.api_path());
        descriptor.ca_data = Some(read(&ca_path)?);

        let provider = TokenFileProvider::new(SERVICE_ACCOUNT_PROVIDER, pod.token_path());
        Self::for_provider(Arc::new(provider), descriptor)
    }

    /// connection for `context`, or the current context when `None`
    pub fn from_kube_config(config: &KubeConfig, context: Option<&str>) -> Result<Self, AuthError> {
        let context_name = context.unwrap_or(config.current_context.as_str());
        let context = config.context(context_name).ok_or_else(|| {
            AuthError::configuration(format!("context {context_name:?} not found in kubeconfig"))
        })?;
        let cluster = &config
            .cluster(&context.context.cluster)
            .ok_or_else(|| {
                AuthError::configuration(format!(
                    "cluster {:?} not found in kubeconfig",
                    context.context.cluster
                ))
            })?
            .cluster;
        let user = &config
            .user(&context.context.user)
            .ok_or_else(|| {
                AuthError::configuration(format!(
                    "user {:?} not found in kubeconfig",
                    context.context.user
                ))
            })?
            .user;

        if cluster.server.trim().is_empty() {
            return Err(AuthError::configuration(format!(
                "cluster {:?} has no server",
                context.context.cluster
            )));
        }
        let descriptor = ClusterDescriptor {
            server: cluster.server.clone(),
            tls_server_name: cluster.tls_server_name.clone(),
            insecure_skip_tls_verify: cluster.insecure(),
            ca_data: cluster.ca()?,
            proxy_url: cluster.proxy_url.clone(),
            disable_compression: cluster.disable_compression.unwrap_or(false),
            provider_config: cluster
                .extensions
                .iter()
                .find(|ext| ext.name == CLUSTER_EXEC_EXTENSION_KEY)
                .map(|ext| ext.extension.clone()),
            extensions: vec![],
        };

        Self::for_provider(user_provider(user)?, descriptor)
    }
}

fn user_provider(user: &UserDetail) -> Result<Arc<dyn CredentialProvider>, AuthError> {
    if let Some(exec) = &user.exec {
        debug!(command = %exec.command, "using exec credential plugin");
        return Ok(Arc::new(ExecProvider::new(KUBECONFIG_PROVIDER, exec.clone())));
    }
    if user.auth_provider.is_some() {
        return Err(AuthError::configuration(
            "auth-provider users are not supported, use exec",
        ));
    }

    let identity = user.client_identity()?;
    if let (Some(path), None, None) = (&user.token_file, &user.token, &identity) {
        debug!(%path, "using token file");
        return Ok(Arc::new(TokenFileProvider::new(KUBECONFIG_PROVIDER, path)));
    }

    let mut credential = Credential {
        token: user.bearer_token()?,
        ..Default::default()
    };
    if let Some((cert, key)) = identity {
        credential.client_certificate_data = Some(pem_string(cert)?);
        credential.client_key_data = Some(pem_string(key)?);
    }
    if credential.token.is_none() && credential.client_certificate_data.is_none() {
        return Err(AuthError::configuration(
            "kubeconfig user has no exec, token or client certificate",
        ));
    }
    Ok(Arc::new(StaticProvider::new(KUBECONFIG_PROVIDER, credential)))
}

fn pem_string(data: Vec<u8>) -> Result<String, AuthError> {
    String::from_utf8(data).map_err(|err| AuthError::malformed(format!("invalid PEM: {err}")))
}

use async_trait::async_trait;
use tracing::debug;
use tracing::warn;

use inventory_config::KubeConfig;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::core::namespace::NamespaceSpec;
use inventory_types::core::secret::SecretSpec;
use inventory_types::K8Obj;
use inventory_types::LabelSelector;
use inventory_types::DEFAULT_NS;

use crate::AuthError;
use crate::RestConfig;

/// namespace label naming the consumer its kubeconfig secrets are meant for
pub const LABEL_CONSUMER_KEY: &str = "x-k8s.io/cluster-inventory-consumer";
/// secret label naming the ClusterProfile the kubeconfig connects to
pub const LABEL_CLUSTER_PROFILE_KEY: &str = "x-k8s.io/cluster-profile";
pub const LABEL_CLUSTER_PROFILE_NAMESPACE_KEY: &str = "x-k8s.io/cluster-profile-namespace";

/// data key holding the kubeconfig
pub const SECRET_CONFIG_KEY: &str = "config";

/// label-selected listing of namespaces and secrets on the hub
#[async_trait]
pub trait LabelledSecrets: Send + Sync {
    async fn list_namespaces(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<K8Obj<NamespaceSpec>>, AuthError>;

    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<K8Obj<SecretSpec>>, AuthError>;
}

/// REST config from the kubeconfig Secret published for `consumer` and `profile`
///
/// Secrets are searched in every namespace labelled for the consumer. Exactly
/// one Secret may match.
pub async fn build_config_from_secret<L>(
    source: &L,
    consumer: &str,
    profile: &K8Obj<ClusterProfileSpec>,
) -> Result<RestConfig, AuthError>
where
    L: LabelledSecrets + ?Sized,
{
    let secret = find_secret(source, consumer, profile).await?;
    let data = secret
        .header
        .decoded(SECRET_CONFIG_KEY)
        .ok_or_else(|| {
            AuthError::configuration(format!(
                "secret {}/{} has no {SECRET_CONFIG_KEY:?} key",
                secret.metadata.namespace, secret.metadata.name
            ))
        })?
        .map_err(|err| AuthError::configuration(format!("secret config is not base64: {err}")))?;

    let config = KubeConfig::from_bytes(&data)?;
    RestConfig::from_kube_config(&config, None)
}

async fn find_secret<L>(
    source: &L,
    consumer: &str,
    profile: &K8Obj<ClusterProfileSpec>,
) -> Result<K8Obj<SecretSpec>, AuthError>
where
    L: LabelledSecrets + ?Sized,
{
    let profile_name = &profile.metadata.name;
    let profile_namespace = profile.metadata.namespace_or_default();

    let namespaces = source
        .list_namespaces(&LabelSelector::new_labels(vec![(LABEL_CONSUMER_KEY, consumer)]))
        .await?;
    let selector = LabelSelector::new_labels(vec![(LABEL_CLUSTER_PROFILE_KEY, profile_name.as_str())]);

    let mut matched = vec![];
    for namespace in &namespaces {
        let secrets = source.list_secrets(&namespace.metadata.name, &selector).await?;
        debug!(
            namespace = %namespace.metadata.name,
            count = secrets.len(),
            "listed cluster profile secrets"
        );
        matched.extend(secrets.into_iter().filter(|secret| {
            match secret.metadata.labels.get(LABEL_CLUSTER_PROFILE_NAMESPACE_KEY) {
                Some(namespace) => namespace == profile_namespace,
                None => profile_namespace == DEFAULT_NS,
            }
        }));
    }

    if matched.len() > 1 {
        warn!(profile = %profile_name, count = matched.len(), "ambiguous kubeconfig secrets");
        return Err(AuthError::configuration(format!(
            "found {} secrets for cluster profile {profile_namespace}/{profile_name}, expected one",
            matched.len()
        )));
    }
    matched.pop().ok_or_else(|| {
        AuthError::configuration(format!(
            "no secret found for cluster profile {profile_namespace}/{profile_name} and consumer {consumer}"
        ))
    })
}

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use inventory_config::KubeConfig;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::core::secret::SecretSpec;
use inventory_types::K8Obj;

use crate::AuthError;
use crate::ClusterDescriptor;
use crate::Credential;

use super::CredentialProvider;

pub const SECRET_READER_PROVIDER: &str = "secretreader";
pub const KUBECONFIG_SECRET_READER_PROVIDER: &str = "kubeconfig-secretreader";

/// default `Secret.data` key holding the bearer token
pub const SECRET_TOKEN_KEY: &str = "token";

/// read access to Secrets on the hub
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<K8Obj<SecretSpec>, AuthError>;
}

/// read access to ClusterProfiles on the hub
#[async_trait]
pub trait ClusterProfileSource: Send + Sync {
    async fn list_cluster_profiles(&self) -> Result<Vec<K8Obj<ClusterProfileSpec>>, AuthError>;
}

/// what the Secret holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretFormat {
    /// a bearer token under a data key
    Token,
    /// a whole kubeconfig under a data key
    Kubeconfig,
}

/// provider settings carried in the cluster's exec config
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecretReaderConfig {
    pub name: Option<String>,
    pub key: Option<String>,
    pub namespace: Option<String>,
    pub context: Option<String>,
}

impl SecretReaderConfig {
    fn from_descriptor(descriptor: &ClusterDescriptor) -> Result<Self, AuthError> {
        match &descriptor.provider_config {
            Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                AuthError::configuration(format!("invalid secret reader config: {err}"))
            }),
            None => Ok(Self::default()),
        }
    }
}

/// Reads credentials out of a Secret on the hub cluster.
pub struct SecretReaderProvider {
    name: String,
    format: SecretFormat,
    namespace: String,
    secrets: Arc<dyn SecretSource>,
    profiles: Option<Arc<dyn ClusterProfileSource>>,
}

impl SecretReaderProvider {
    /// token format; without a Secret name in the cluster config the Secret is
    /// named after the ClusterProfile whose endpoint matches the request
    pub fn token<N: Into<String>>(
        namespace: N,
        secrets: Arc<dyn SecretSource>,
        profiles: Arc<dyn ClusterProfileSource>,
    ) -> Self {
        Self {
            name: SECRET_READER_PROVIDER.to_owned(),
            format: SecretFormat::Token,
            namespace: namespace.into(),
            secrets,
            profiles: Some(profiles),
        }
    }

    pub fn kubeconfig<N: Into<String>>(namespace: N, secrets: Arc<dyn SecretSource>) -> Self {
        Self {
            name: KUBECONFIG_SECRET_READER_PROVIDER.to_owned(),
            format: SecretFormat::Kubeconfig,
            namespace: namespace.into(),
            secrets,
            profiles: None,
        }
    }

    pub fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    pub fn format(&self) -> SecretFormat {
        self.format
    }

    fn failure<M: ToString>(&self, message: M) -> AuthError {
        AuthError::invocation(self.name.clone(), message)
    }

    async fn secret_data(
        &self,
        namespace: &str,
        name: &str,
        key: &str,
    ) -> Result<Vec<u8>, AuthError> {
        debug!(provider = %self.name, namespace, name, key, "reading secret");
        let secret = self
            .secrets
            .get_secret(namespace, name)
            .await
            .map_err(|err| self.failure(format!("failed to get secret {namespace}/{name}: {err}")))?;

        let data = secret
            .header
            .decoded(key)
            .ok_or_else(|| self.failure(format!("secret {namespace}/{name} missing {key:?} key")))?
            .map_err(|err| AuthError::malformed(format!("secret {namespace}/{name} key {key}: {err}")))?;
        if data.is_empty() {
            return Err(self.failure(format!("secret {namespace}/{name} missing {key:?} key")));
        }
        Ok(data)
    }

    async fn token_credential(
        &self,
        descriptor: &ClusterDescriptor,
        config: SecretReaderConfig,
    ) -> Result<Credential, AuthError> {
        let namespace = config.namespace.unwrap_or_else(|| self.namespace.clone());
        let key = config.key.unwrap_or_else(|| SECRET_TOKEN_KEY.to_owned());
        let name = match config.name {
            Some(name) => name,
            None => self.discover_profile(descriptor).await?,
        };

        let data = self.secret_data(&namespace, &name, &key).await?;
        let token = String::from_utf8(data)
            .map_err(|err| AuthError::malformed(format!("token in {namespace}/{name}: {err}")))?;
        Ok(Credential::token(token.trim()))
    }

    async fn discover_profile(&self, descriptor: &ClusterDescriptor) -> Result<String, AuthError> {
        let profiles = self
            .profiles
            .as_ref()
            .ok_or_else(|| AuthError::configuration("secret name is required"))?;
        let list = profiles
            .list_cluster_profiles()
            .await
            .map_err(|err| self.failure(format!("failed to list ClusterProfiles: {err}")))?;

        pick_cluster_profile(
            &list,
            &self.name,
            &normalize_host(&descriptor.server),
            descriptor.ca_data.as_deref(),
        )
        .map(str::to_owned)
        .ok_or_else(|| {
            self.failure(format!(
                "no matching ClusterProfile for endpoint: {}",
                descriptor.server
            ))
        })
    }

    async fn kubeconfig_credential(
        &self,
        config: SecretReaderConfig,
    ) -> Result<Credential, AuthError> {
        let name = config
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AuthError::configuration("missing name in cluster config"))?;
        let key = config
            .key
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AuthError::configuration("missing key in cluster config"))?;
        let namespace = config.namespace.unwrap_or_else(|| self.namespace.clone());

        let data = self.secret_data(&namespace, &name, &key).await?;
        let kube_config = KubeConfig::from_bytes(&data).map_err(|err| {
            AuthError::malformed(format!(
                "failed to parse kubeconfig from secret {namespace}/{name}: {err}"
            ))
        })?;
        credential_from_kubeconfig(&kube_config, config.context.as_deref())
    }
}

#[async_trait]
impl CredentialProvider for SecretReaderProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, descriptor: &ClusterDescriptor) -> Result<(), AuthError> {
        SecretReaderConfig::from_descriptor(descriptor).map(|_| ())
    }

    async fn credential(&self, descriptor: &ClusterDescriptor) -> Result<Credential, AuthError> {
        let config = SecretReaderConfig::from_descriptor(descriptor)?;
        match self.format {
            SecretFormat::Token => self.token_credential(descriptor, config).await,
            SecretFormat::Kubeconfig => self.kubeconfig_credential(config).await,
        }
    }
}

impl fmt::Debug for SecretReaderProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretReaderProvider")
            .field("name", &self.name)
            .field("format", &self.format)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Credential of a kubeconfig user, taken from `context` or the current context.
///
/// Only inline data is accepted: file references and kubeconfig extensions are
/// rejected.
pub fn credential_from_kubeconfig(
    config: &KubeConfig,
    context: Option<&str>,
) -> Result<Credential, AuthError> {
    if !config.extensions.is_empty() {
        return Err(AuthError::configuration(
            "kubeconfig extensions are not supported",
        ));
    }

    let context_name = context
        .filter(|name| !name.is_empty())
        .unwrap_or(config.current_context.as_str());
    if context_name.is_empty() {
        return Err(AuthError::configuration(
            "no context specified and no current-context in kubeconfig",
        ));
    }
    let context = config.context(context_name).ok_or_else(|| {
        AuthError::configuration(format!("context {context_name:?} not found in kubeconfig"))
    })?;
    let user_name = &context.context.user;
    let user = &config
        .user(user_name)
        .ok_or_else(|| AuthError::configuration(format!("user {user_name:?} not found in kubeconfig")))?
        .user;

    let mut credential = Credential {
        token: user.token.clone().filter(|token| !token.is_empty()),
        ..Default::default()
    };

    let cert_data = user.client_certificate_data.as_deref().filter(|d| !d.is_empty());
    let key_data = user.client_key_data.as_deref().filter(|d| !d.is_empty());
    let has_cert = cert_data.is_some() || user.client_certificate.is_some();
    let has_key = key_data.is_some() || user.client_key.is_some();

    if has_cert || has_key {
        if !has_cert {
            return Err(AuthError::Pairing(format!(
                "client-key-data found but no client-certificate-data in user {user_name:?}"
            )));
        }
        if !has_key {
            return Err(AuthError::Pairing(format!(
                "client-certificate-data found but no client-key-data in user {user_name:?}"
            )));
        }
        let cert = cert_data.ok_or_else(|| {
            AuthError::configuration(
                "client-certificate file path is not supported; use client-certificate-data",
            )
        })?;
        let key = key_data.ok_or_else(|| {
            AuthError::configuration("client-key file path is not supported; use client-key-data")
        })?;
        credential.client_certificate_data = Some(decode_pem(cert)?);
        credential.client_key_data = Some(decode_pem(key)?);
    }

    if credential.token.is_none() && credential.client_certificate_data.is_none() {
        return Err(AuthError::malformed(format!(
            "no authentication method found in user {user_name:?} \
             (neither token nor client-certificate-data/client-key-data)"
        )));
    }
    Ok(credential)
}

fn decode_pem(data: &str) -> Result<String, AuthError> {
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|err| AuthError::malformed(format!("invalid base64 in kubeconfig: {err}")))?;
    String::from_utf8(bytes).map_err(|err| AuthError::malformed(format!("invalid PEM: {err}")))
}

/// `https://example.com:443/` becomes `example.com`
pub fn normalize_host(raw: &str) -> String {
    let raw = raw.trim();
    let host = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(raw);
    let host = host.strip_suffix('/').unwrap_or(host);
    host.strip_suffix(":443").unwrap_or(host).to_owned()
}

/// name of the first ClusterProfile whose `provider` entry points at `server`
/// and, when `ca` is given, carries the same CA bytes
pub fn pick_cluster_profile<'a>(
    profiles: &'a [K8Obj<ClusterProfileSpec>],
    provider: &str,
    server: &str,
    ca: Option<&[u8]>,
) -> Option<&'a str> {
    let provider = provider.trim();
    if provider.is_empty() || server.is_empty() {
        return None;
    }
    let ca = ca.filter(|ca| !ca.is_empty());

    profiles
        .iter()
        .find(|profile| {
            let status = &profile.status;
            status
                .credential_providers
                .iter()
                .chain(status.access_providers.iter())
                .filter(|entry| entry.name.trim() == provider)
                .any(|entry| {
                    normalize_host(&entry.config.server) == server
                        && ca.map_or(true, |ca| {
                            entry.config.certificate_authority_data.as_deref() == Some(ca)
                        })
                })
        })
        .map(|profile| profile.metadata.name.as_str())
}

#[cfg(test)]
mod test {

    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use inventory_config::KubeConfig;
    use inventory_types::cluster_profile::AccessProvider;
    use inventory_types::cluster_profile::ClusterProfileSpec;
    use inventory_types::cluster_profile::ProviderConfig;
    use inventory_types::core::secret::SecretHeader;
    use inventory_types::core::secret::SecretSpec;
    use inventory_types::K8Obj;
    use inventory_types::MetaStatus;

    use crate::provider::CredentialProvider;
    use crate::AuthError;
    use crate::ClusterDescriptor;

    use super::*;

    #[derive(Default)]
    struct Hub {
        secrets: HashMap<(String, String), K8Obj<SecretSpec>>,
        profiles: Vec<K8Obj<ClusterProfileSpec>>,
    }

    impl Hub {
        fn secret(mut self, namespace: &str, name: &str, key: &str, value: &[u8]) -> Self {
            let mut header = SecretHeader::default();
            header.insert_encoded(key, value);
            let secret = K8Obj::new(name, SecretSpec::default())
                .set_namespace(namespace)
                .set_header(header);
            self.secrets
                .insert((namespace.to_owned(), name.to_owned()), secret);
            self
        }

        fn profile(mut self, name: &str, provider: &str, server: &str, ca: Option<&[u8]>) -> Self {
            let mut profile = K8Obj::new(name, ClusterProfileSpec::default()).set_namespace("fleet");
            profile.status.credential_providers.push(AccessProvider {
                name: provider.to_owned(),
                config: ProviderConfig {
                    server: server.to_owned(),
                    certificate_authority_data: ca.map(<[u8]>::to_vec),
                    ..Default::default()
                },
            });
            self.profiles.push(profile);
            self
        }
    }

    #[async_trait]
    impl SecretSource for Hub {
        async fn get_secret(
            &self,
            namespace: &str,
            name: &str,
        ) -> Result<K8Obj<SecretSpec>, AuthError> {
            self.secrets
                .get(&(namespace.to_owned(), name.to_owned()))
                .cloned()
                .ok_or_else(|| {
                    AuthError::Api(MetaStatus {
                        code: Some(404),
                        ..Default::default()
                    })
                })
        }
    }

    #[async_trait]
    impl ClusterProfileSource for Hub {
        async fn list_cluster_profiles(
            &self,
        ) -> Result<Vec<K8Obj<ClusterProfileSpec>>, AuthError> {
            Ok(self.profiles.clone())
        }
    }

    fn token_provider(hub: Hub) -> SecretReaderProvider {
        let hub = Arc::new(hub);
        SecretReaderProvider::token("fleet-system", hub.clone(), hub)
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("https://example.com:443/"), "example.com");
        assert_eq!(normalize_host("https://example.com:6443"), "example.com:6443");
        assert_eq!(normalize_host("http://example.com/api/"), "example.com/api");
        assert_eq!(normalize_host("example.com"), "example.com");
    }

    #[test]
    fn test_pick_cluster_profile() {
        let hub = Hub::default()
            .profile("other", "exec", "https://east.example.com", None)
            .profile("east", "secretreader", "https://east.example.com:443", Some(b"ca-east"))
            .profile("west", "secretreader", "https://west.example.com", None);

        let pick = |server: &str, ca: Option<&[u8]>| {
            pick_cluster_profile(&hub.profiles, "secretreader", &normalize_host(server), ca)
                .map(str::to_owned)
        };
        assert_eq!(pick("https://east.example.com/", None).as_deref(), Some("east"));
        assert_eq!(pick("https://east.example.com", Some(b"ca-east")).as_deref(), Some("east"));
        assert_eq!(pick("https://east.example.com", Some(b"ca-other")), None);
        assert_eq!(pick("https://north.example.com", None), None);
    }

    #[tokio::test]
    async fn test_token_by_discovered_profile() {
        let hub = Hub::default()
            .profile("east", "secretreader", "https://east.example.com", None)
            .secret("fleet-system", "east", "token", b"east-token\n");

        let credential = token_provider(hub)
            .credential(&ClusterDescriptor::new("https://east.example.com:443"))
            .await
            .expect("credential");
        assert_eq!(credential.token.as_deref(), Some("east-token"));
    }

    #[tokio::test]
    async fn test_token_by_explicit_name() {
        let hub = Hub::default().secret("other-ns", "creds", "bearer", b"explicit");

        let mut descriptor = ClusterDescriptor::new("https://east.example.com");
        descriptor.provider_config = Some(json!({
            "name": "creds",
            "key": "bearer",
            "namespace": "other-ns"
        }));

        let credential = token_provider(hub)
            .credential(&descriptor)
            .await
            .expect("credential");
        assert_eq!(credential.token.as_deref(), Some("explicit"));
    }

    #[tokio::test]
    async fn test_token_missing() {
        let hub = Hub::default()
            .profile("east", "secretreader", "https://east.example.com", None)
            .secret("fleet-system", "east", "other", b"x");
        let provider = token_provider(hub);

        let err = provider
            .credential(&ClusterDescriptor::new("https://east.example.com"))
            .await
            .expect_err("missing key");
        assert!(err.to_string().contains("missing \"token\" key"));

        let err = provider
            .credential(&ClusterDescriptor::new("https://west.example.com"))
            .await
            .expect_err("no profile");
        assert!(err.to_string().contains("no matching ClusterProfile"));
    }

    const HUB_KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: east
clusters:
- name: east
  cluster:
    server: https://east.example.com
contexts:
- name: east
  context:
    cluster: east
    user: east-token
- name: east-cert
  context:
    cluster: east
    user: east-cert
- name: east-half
  context:
    cluster: east
    user: east-half
- name: east-file
  context:
    cluster: east
    user: east-file
- name: east-none
  context:
    cluster: east
    user: east-none
users:
- name: east-token
  user:
    token: kube-token
- name: east-cert
  user:
    client-certificate-data: Y2VydC1wZW0=
    client-key-data: a2V5LXBlbQ==
- name: east-half
  user:
    client-certificate-data: Y2VydC1wZW0=
- name: east-file
  user:
    client-certificate: /etc/certs/east.crt
    client-key: /etc/certs/east.key
- name: east-none
  user: {}
"#;

    fn hub_config() -> KubeConfig {
        KubeConfig::from_bytes(HUB_KUBECONFIG.as_bytes()).expect("kubeconfig")
    }

    #[test]
    fn test_kubeconfig_user_credentials() {
        let config = hub_config();

        let token = credential_from_kubeconfig(&config, None).expect("token");
        assert_eq!(token.token.as_deref(), Some("kube-token"));

        let cert = credential_from_kubeconfig(&config, Some("east-cert")).expect("cert");
        assert_eq!(cert.client_certificate_data.as_deref(), Some("cert-pem"));
        assert_eq!(cert.client_key_data.as_deref(), Some("key-pem"));
        assert!(cert.token.is_none());
    }

    #[test]
    fn test_kubeconfig_user_rejections() {
        let config = hub_config();

        assert!(matches!(
            credential_from_kubeconfig(&config, Some("east-half")),
            Err(AuthError::Pairing(_))
        ));
        let err = credential_from_kubeconfig(&config, Some("east-file")).expect_err("file");
        assert!(err.to_string().contains("file path is not supported"));
        assert!(credential_from_kubeconfig(&config, Some("east-none")).is_err());
        assert!(credential_from_kubeconfig(&config, Some("missing")).is_err());

        let mut with_extension = config;
        with_extension.extensions.push(inventory_config::NamedExtension {
            name: "x".to_owned(),
            extension: json!({}),
        });
        assert!(credential_from_kubeconfig(&with_extension, None).is_err());
    }

    #[tokio::test]
    async fn test_kubeconfig_secret() {
        let hub = Arc::new(Hub::default().secret(
            "fleet-system",
            "east-kubeconfig",
            "value",
            HUB_KUBECONFIG.as_bytes(),
        ));
        let provider = SecretReaderProvider::kubeconfig("fleet-system", hub);
        assert_eq!(provider.name(), "kubeconfig-secretreader");

        let mut descriptor = ClusterDescriptor::new("https://east.example.com");
        descriptor.provider_config = Some(json!({
            "name": "east-kubeconfig",
            "key": "value",
            "context": "east-cert"
        }));
        let credential = provider.credential(&descriptor).await.expect("credential");
        assert_eq!(credential.client_key_data.as_deref(), Some("key-pem"));

        descriptor.provider_config = Some(json!({ "name": "east-kubeconfig" }));
        assert!(matches!(
            provider.credential(&descriptor).await,
            Err(AuthError::Configuration(_))
        ));
    }
}

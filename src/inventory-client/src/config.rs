use std::fmt;
use std::path::Path;
use std::sync::Arc;

use hyper::Body;
use hyper::Client;
use tracing::debug;

use inventory_config::ProviderFile;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::K8Obj;

use crate::provider::CredentialProvider;
use crate::resolver::resolve;
use crate::tls::client_tls_config;
use crate::AuthError;
use crate::AuthRoundTripper;
use crate::Authenticator;
use crate::ClusterDescriptor;
use crate::ProviderRegistry;
use crate::TrackingConnector;

pub type AuthenticatedClient = AuthRoundTripper<Client<TrackingConnector, Body>>;

/// Everything needed to talk to one cluster.
#[derive(Clone)]
pub struct RestConfig {
    pub host: String,
    pub tls_server_name: Option<String>,
    pub insecure: bool,
    pub ca_data: Option<Vec<u8>>,
    pub proxy_url: Option<String>,
    pub authenticator: Arc<Authenticator>,
}

impl RestConfig {
    /// config bound to `provider`; the provider checks the descriptor first
    pub fn for_provider(
        provider: Arc<dyn CredentialProvider>,
        descriptor: ClusterDescriptor,
    ) -> Result<Self, AuthError> {
        provider.prepare(&descriptor)?;
        Ok(Self::from_authenticator(Arc::new(Authenticator::new(
            provider, descriptor,
        ))))
    }

    pub fn from_authenticator(authenticator: Arc<Authenticator>) -> Self {
        let descriptor = authenticator.descriptor();
        Self {
            host: descriptor.server.clone(),
            tls_server_name: descriptor.tls_server_name.clone(),
            insecure: descriptor.insecure_skip_tls_verify,
            ca_data: descriptor.ca_data.clone(),
            proxy_url: descriptor.proxy_url.clone(),
            authenticator,
        }
    }

    /// HTTP client whose requests are authenticated by this config's session
    pub fn build_client(&self) -> Result<AuthenticatedClient, AuthError> {
        let tls = client_tls_config(
            self.ca_data.as_deref(),
            self.insecure,
            self.authenticator.cert_slot(),
        )?;
        let mut connector = TrackingConnector::new(tls, self.authenticator.tracker())
            .with_server_name(self.tls_server_name.clone());
        if let Some(proxy_url) = self.proxy_url.as_deref().filter(|url| !url.is_empty()) {
            connector = connector
                .with_proxy(proxy_url)
                .map_err(|err| AuthError::configuration(format!("proxy url: {err}")))?;
        }

        debug!(host = %self.host, "building cluster client");
        let client = Client::builder().build::<_, Body>(connector);
        Ok(AuthRoundTripper::new(client, self.authenticator.clone()))
    }
}

impl fmt::Debug for RestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestConfig")
            .field("host", &self.host)
            .field("tls_server_name", &self.tls_server_name)
            .field("insecure", &self.insecure)
            .field("proxy_url", &self.proxy_url)
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

/// Turns ClusterProfiles into REST configs using the providers it knows.
#[derive(Debug, Clone, Default)]
pub struct CredentialsProvider {
    registry: ProviderRegistry,
}

impl CredentialsProvider {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// exec providers listed in a provider file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let file = ProviderFile::from_file(path)?;
        Ok(Self::new(ProviderRegistry::from_provider_file(&file)))
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ProviderRegistry {
        &mut self.registry
    }

    pub fn build_config_from_cp(
        &self,
        profile: &K8Obj<ClusterProfileSpec>,
    ) -> Result<RestConfig, AuthError> {
        let resolved = resolve(profile, &self.registry)?;
        RestConfig::for_provider(resolved.provider, resolved.descriptor)
    }
}

use serde_json::Value;

use inventory_types::cluster_profile::NamedExtension;
use inventory_types::cluster_profile::ProviderConfig;
use inventory_types::cluster_profile::CLUSTER_EXEC_EXTENSION_KEY;
use inventory_types::exec_credential::ExecCluster;

use crate::AuthError;

/// Connection metadata of one cluster as seen by one provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterDescriptor {
    pub server: String,
    pub tls_server_name: Option<String>,
    pub insecure_skip_tls_verify: bool,
    pub ca_data: Option<Vec<u8>>,
    pub proxy_url: Option<String>,
    /// forwarded to exec plugins; the HTTP client never requests compressed bodies
    pub disable_compression: bool,
    /// provider specific settings, opaque to the core
    pub provider_config: Option<Value>,
    pub extensions: Vec<NamedExtension>,
}

impl ClusterDescriptor {
    pub fn new<S: Into<String>>(server: S) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// descriptor for a ClusterProfile provider entry
    ///
    /// The reserved `client.authentication.k8s.io/exec` extension, when present,
    /// replaces the entry's inline `config` as provider settings.
    pub fn from_provider_config(config: &ProviderConfig) -> Result<Self, AuthError> {
        if config.server.trim().is_empty() {
            return Err(AuthError::configuration("cluster server must not be empty"));
        }
        let provider_config = config
            .extension(CLUSTER_EXEC_EXTENSION_KEY)
            .cloned()
            .or_else(|| config.config.clone());
        Ok(Self {
            server: config.server.clone(),
            tls_server_name: config.tls_server_name.clone(),
            insecure_skip_tls_verify: config.insecure_skip_tls_verify,
            ca_data: config.certificate_authority_data.clone(),
            proxy_url: config.proxy_url.clone(),
            disable_compression: config.disable_compression,
            provider_config,
            extensions: config.extensions.clone(),
        })
    }

    /// descriptor handed to a plugin in `KUBERNETES_EXEC_INFO`
    pub fn from_exec_cluster(cluster: ExecCluster) -> Result<Self, AuthError> {
        let server = cluster.server.trim();
        if server.is_empty() || server == "null" {
            return Err(AuthError::configuration(
                "spec.cluster.server is missing in exec info",
            ));
        }
        Ok(Self {
            server: server.to_owned(),
            tls_server_name: cluster.tls_server_name,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            ca_data: cluster.certificate_authority_data,
            proxy_url: cluster.proxy_url,
            disable_compression: cluster.disable_compression,
            provider_config: cluster.config,
            extensions: vec![],
        })
    }

    pub fn to_exec_cluster(&self) -> ExecCluster {
        ExecCluster {
            server: self.server.clone(),
            tls_server_name: self.tls_server_name.clone(),
            insecure_skip_tls_verify: self.insecure_skip_tls_verify,
            certificate_authority_data: self.ca_data.clone(),
            proxy_url: self.proxy_url.clone(),
            disable_compression: self.disable_compression,
            config: self.provider_config.clone(),
        }
    }

    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions
            .iter()
            .find(|ext| ext.name == name)
            .map(|ext| &ext.extension)
    }
}

#[cfg(test)]
mod test {

    use serde_json::json;

    use inventory_types::cluster_profile::NamedExtension;
    use inventory_types::cluster_profile::ProviderConfig;
    use inventory_types::exec_credential::ExecCluster;

    use super::ClusterDescriptor;

    #[test]
    fn test_exec_extension_overrides_inline_config() {
        let config = ProviderConfig {
            server: "https://east.example.com".to_owned(),
            config: Some(json!({ "inline": true })),
            extensions: vec![NamedExtension {
                name: "client.authentication.k8s.io/exec".to_owned(),
                extension: json!({ "audience": "hub" }),
            }],
            ..Default::default()
        };

        let descriptor = ClusterDescriptor::from_provider_config(&config).expect("descriptor");
        assert_eq!(descriptor.provider_config, Some(json!({ "audience": "hub" })));

        let inline = ProviderConfig {
            extensions: vec![],
            ..config
        };
        let descriptor = ClusterDescriptor::from_provider_config(&inline).expect("descriptor");
        assert_eq!(descriptor.provider_config, Some(json!({ "inline": true })));
    }

    #[test]
    fn test_empty_server_rejected() {
        assert!(ClusterDescriptor::from_provider_config(&ProviderConfig::default()).is_err());
        for server in ["", "  ", "null"] {
            let cluster = ExecCluster {
                server: server.to_owned(),
                ..Default::default()
            };
            assert!(ClusterDescriptor::from_exec_cluster(cluster).is_err());
        }
    }

    #[test]
    fn test_exec_cluster_conversion() {
        let mut descriptor = ClusterDescriptor::new("https://east.example.com");
        descriptor.ca_data = Some(b"ca".to_vec());
        descriptor.provider_config = Some(json!({ "name": "east" }));

        let cluster = descriptor.to_exec_cluster();
        let back = ClusterDescriptor::from_exec_cluster(cluster).expect("descriptor");
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_compression_flag_reaches_exec_plugin() {
        let config = ProviderConfig {
            server: "https://east.example.com".to_owned(),
            disable_compression: true,
            ..Default::default()
        };
        let descriptor = ClusterDescriptor::from_provider_config(&config).expect("descriptor");
        assert!(descriptor.to_exec_cluster().disable_compression);
    }
}

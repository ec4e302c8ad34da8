use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use inventory_types::cluster_profile::AccessProvider;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::K8Obj;

use crate::provider::CredentialProvider;
use crate::AuthError;
use crate::ClusterDescriptor;
use crate::ProviderRegistry;

/// provider selected for a cluster, with the cluster's connection metadata
#[derive(Clone)]
pub struct ResolvedProvider {
    pub provider: Arc<dyn CredentialProvider>,
    pub descriptor: ClusterDescriptor,
}

impl std::fmt::Debug for ResolvedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedProvider")
            .field("provider", &self.provider.name())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Pick the provider for `profile`: the first registry entry, in registration
/// order, that the profile lists.
///
/// Legacy `credentialProviders` and `accessProviders` are merged by name with
/// `accessProviders` winning.
pub fn resolve(
    profile: &K8Obj<ClusterProfileSpec>,
    registry: &ProviderRegistry,
) -> Result<ResolvedProvider, AuthError> {
    let profile_name = &profile.metadata.name;
    let status = &profile.status;

    let mut entries: HashMap<&str, (&AccessProvider, bool)> = HashMap::new();
    for entry in &status.credential_providers {
        entries.insert(entry.name.as_str(), (entry, true));
    }
    for entry in &status.access_providers {
        entries.insert(entry.name.as_str(), (entry, false));
    }

    let no_match = || AuthError::NoMatchingProvider {
        profile: profile_name.clone(),
    };

    let (provider, entry, legacy) = registry
        .iter()
        .find_map(|provider| {
            entries
                .get(provider.name())
                .map(|(entry, legacy)| (provider.clone(), *entry, *legacy))
        })
        .ok_or_else(no_match)?;

    if legacy {
        warn!(
            profile = %profile_name,
            provider = %entry.name,
            "cluster profile uses deprecated credentialProviders, migrate to accessProviders"
        );
    }

    if entry.config.server.trim().is_empty() {
        debug!(provider = %entry.name, "matched provider entry has no server");
        return Err(no_match());
    }

    let descriptor = ClusterDescriptor::from_provider_config(&entry.config)?;
    debug!(profile = %profile_name, provider = %entry.name, server = %descriptor.server, "resolved provider");
    Ok(ResolvedProvider {
        provider,
        descriptor,
    })
}

#[cfg(test)]
mod test {

    use inventory_types::cluster_profile::AccessProvider;
    use inventory_types::cluster_profile::ClusterProfileSpec;
    use inventory_types::cluster_profile::ProviderConfig;
    use inventory_types::K8Obj;

    use crate::provider::StaticProvider;
    use crate::AuthError;
    use crate::Credential;
    use crate::ProviderRegistry;

    use super::resolve;

    fn entry(name: &str, server: &str) -> AccessProvider {
        AccessProvider {
            name: name.to_owned(),
            config: ProviderConfig {
                server: server.to_owned(),
                ..Default::default()
            },
        }
    }

    fn profile(legacy: Vec<AccessProvider>, access: Vec<AccessProvider>) -> K8Obj<ClusterProfileSpec> {
        let mut profile = K8Obj::new("east", ClusterProfileSpec::default()).set_namespace("fleet");
        profile.status.credential_providers = legacy;
        profile.status.access_providers = access;
        profile
    }

    fn registry(names: &[&str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for name in names {
            registry.register(StaticProvider::new(*name, Credential::token("t")));
        }
        registry
    }

    #[test]
    fn test_registry_subset_selects_supported_provider() {
        let profile = profile(
            vec![],
            vec![entry("p1", "https://p1.example.com"), entry("p2", "https://p2.example.com")],
        );

        let resolved = resolve(&profile, &registry(&["p2"])).expect("resolve");
        assert_eq!(resolved.provider.name(), "p2");
        assert_eq!(resolved.descriptor.server, "https://p2.example.com");
    }

    #[test]
    fn test_registry_order_decides() {
        let profile = profile(
            vec![],
            vec![entry("p1", "https://p1.example.com"), entry("p2", "https://p2.example.com")],
        );

        let resolved = resolve(&profile, &registry(&["p2", "p1"])).expect("resolve");
        assert_eq!(resolved.provider.name(), "p2");
    }

    #[test]
    fn test_access_providers_override_legacy() {
        let profile = profile(
            vec![entry("p1", "https://legacy.example.com"), entry("old", "https://old.example.com")],
            vec![entry("p1", "https://new.example.com")],
        );

        let resolved = resolve(&profile, &registry(&["p1"])).expect("resolve");
        assert_eq!(resolved.descriptor.server, "https://new.example.com");

        let legacy_only = resolve(&profile, &registry(&["old"])).expect("legacy");
        assert_eq!(legacy_only.descriptor.server, "https://old.example.com");
    }

    #[test]
    fn test_no_matching_provider() {
        let profile = profile(vec![], vec![entry("p1", "https://p1.example.com")]);
        let err = resolve(&profile, &registry(&["p3"])).expect_err("no match");
        assert!(matches!(err, AuthError::NoMatchingProvider { .. }));

        let empty = profile_without_server();
        let err = resolve(&empty, &registry(&["p1"])).expect_err("no server");
        assert!(matches!(err, AuthError::NoMatchingProvider { .. }));
    }

    fn profile_without_server() -> K8Obj<ClusterProfileSpec> {
        profile(vec![], vec![entry("p1", "")])
    }
}

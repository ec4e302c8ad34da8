use std::fmt;
use std::sync::Arc;

use inventory_config::ProviderFile;

use crate::provider::CredentialProvider;
use crate::provider::ExecProvider;

/// Providers known to a consumer, in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// exec providers declared in a provider file
    pub fn from_provider_file(file: &ProviderFile) -> Self {
        let mut registry = Self::new();
        for spec in &file.providers {
            registry.register(ExecProvider::from_spec(spec));
        }
        registry
    }

    pub fn register<P>(&mut self, provider: P) -> &mut Self
    where
        P: CredentialProvider + 'static,
    {
        self.register_shared(Arc::new(provider))
    }

    pub fn register_shared(&mut self, provider: Arc<dyn CredentialProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// builder form of [`register`](Self::register)
    pub fn with<P>(mut self, provider: P) -> Self
    where
        P: CredentialProvider + 'static,
    {
        self.register(provider);
        self
    }

    /// first provider registered under `name`
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn CredentialProvider>> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CredentialProvider>> {
        self.providers.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use inventory_config::ExecConfig;
    use inventory_config::ProviderFile;
    use inventory_config::ProviderSpec;

    use crate::provider::StaticProvider;
    use crate::Credential;

    use super::ProviderRegistry;

    #[test]
    fn test_first_match_wins() {
        let registry = ProviderRegistry::new()
            .with(StaticProvider::new("shared", Credential::token("first")))
            .with(StaticProvider::new("other", Credential::token("other")))
            .with(StaticProvider::new("shared", Credential::token("second")));

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.names(), vec!["shared", "other", "shared"]);

        let first = registry.lookup("shared").expect("shared");
        let by_iter = registry.iter().next().expect("first");
        assert!(Arc::ptr_eq(&first, by_iter));
        assert!(registry.lookup("missing").is_none());
    }

    #[test]
    fn test_from_provider_file() {
        let file = ProviderFile {
            providers: vec![
                ProviderSpec::new("eks", ExecConfig::new("aws", "client.authentication.k8s.io/v1")),
                ProviderSpec::new("gke", ExecConfig::new("gcloud", "client.authentication.k8s.io/v1")),
            ],
        };
        let registry = ProviderRegistry::from_provider_file(&file);
        assert_eq!(registry.names(), vec!["eks", "gke"]);
    }
}

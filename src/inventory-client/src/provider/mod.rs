mod exec;
mod secret;
#[cfg(feature = "spiffe")]
mod spiffe;
mod spiffe_jwt;
mod static_token;

pub use exec::ExecProvider;
pub use secret::*;
#[cfg(feature = "spiffe")]
pub use spiffe::WorkloadApiSource;
pub use spiffe_jwt::*;
pub use static_token::*;

use async_trait::async_trait;

use crate::ClusterDescriptor;
use crate::Credential;
use crate::AuthError;

/// Produces credentials for a cluster.
///
/// Exec plugins and in-process providers implement the same contract and are
/// interchangeable in a [`ProviderRegistry`](crate::ProviderRegistry).
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// name matched against ClusterProfile provider entries
    fn name(&self) -> &str;

    /// Check once, when a session is configured, that `descriptor` is usable by this provider.
    fn prepare(&self, _descriptor: &ClusterDescriptor) -> Result<(), AuthError> {
        Ok(())
    }

    async fn credential(&self, descriptor: &ClusterDescriptor) -> Result<Credential, AuthError>;
}

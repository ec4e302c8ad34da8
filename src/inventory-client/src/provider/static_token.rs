use std::path::PathBuf;

use async_trait::async_trait;
use tracing::trace;

use crate::AuthError;
use crate::ClusterDescriptor;
use crate::Credential;

use super::CredentialProvider;

/// Hands out the same credential every time.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    credential: Credential,
}

impl StaticProvider {
    pub fn new<N: Into<String>>(name: N, credential: Credential) -> Self {
        Self {
            name: name.into(),
            credential,
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn credential(&self, _descriptor: &ClusterDescriptor) -> Result<Credential, AuthError> {
        Ok(self.credential.clone())
    }
}

/// Bearer token read from a file on every refresh, so rotated service account
/// tokens are picked up after a 401.
#[derive(Debug, Clone)]
pub struct TokenFileProvider {
    name: String,
    path: PathBuf,
}

impl TokenFileProvider {
    pub fn new<N: Into<String>, P: Into<PathBuf>>(name: N, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for TokenFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn credential(&self, _descriptor: &ClusterDescriptor) -> Result<Credential, AuthError> {
        trace!(path = %self.path.display(), "reading token file");
        let token = tokio::fs::read_to_string(&self.path).await.map_err(|err| {
            AuthError::invocation(
                self.name.clone(),
                format!("reading {}: {err}", self.path.display()),
            )
        })?;
        Ok(Credential::token(token.trim()))
    }
}

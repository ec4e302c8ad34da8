use std::env;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use tracing::trace;

use crate::AuthError;
use crate::ClusterDescriptor;
use crate::Credential;

use super::CredentialProvider;

pub const SPIFFE_PROVIDER: &str = "spiffe";

/// workload API socket used when the cluster config names none
pub const SPIFFE_ENDPOINT_SOCKET: &str = "SPIFFE_ENDPOINT_SOCKET";

/// Fetches JWT-SVIDs from a SPIFFE workload API.
#[async_trait]
pub trait JwtSvidSource: Send + Sync {
    async fn fetch_jwt_svid(&self, address: &str, audience: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpiffeConfig {
    pub address: Option<String>,
    pub audience: String,
}

impl SpiffeConfig {
    /// Accepts `{"address", "audience"}` or the same fields nested under `config`.
    pub fn from_value(value: &Value) -> Result<Self, AuthError> {
        let inner = value.get("config").unwrap_or(value);
        let config: Self = serde_json::from_value(inner.clone())
            .map_err(|err| AuthError::configuration(format!("invalid spiffe config: {err}")))?;
        if config.audience.trim().is_empty() {
            return Err(AuthError::configuration("spiffe audience is required"));
        }
        Ok(config)
    }

    fn address(&self) -> Result<String, AuthError> {
        self.address
            .clone()
            .filter(|address| !address.is_empty())
            .or_else(|| env::var(SPIFFE_ENDPOINT_SOCKET).ok())
            .filter(|address| !address.is_empty())
            .ok_or_else(|| {
                AuthError::configuration(format!(
                    "no workload API address configured and {SPIFFE_ENDPOINT_SOCKET} is not set"
                ))
            })
    }
}

/// Bearer token from a JWT-SVID for the cluster's audience.
pub struct SpiffeProvider {
    name: String,
    source: Arc<dyn JwtSvidSource>,
}

impl SpiffeProvider {
    pub fn new(source: Arc<dyn JwtSvidSource>) -> Self {
        Self {
            name: SPIFFE_PROVIDER.to_owned(),
            source,
        }
    }

    pub fn with_name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    fn config(descriptor: &ClusterDescriptor) -> Result<SpiffeConfig, AuthError> {
        let value = descriptor
            .provider_config
            .as_ref()
            .ok_or_else(|| AuthError::configuration("no SPIFFE configured"))?;
        SpiffeConfig::from_value(value)
    }
}

impl fmt::Debug for SpiffeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpiffeProvider")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for SpiffeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, descriptor: &ClusterDescriptor) -> Result<(), AuthError> {
        Self::config(descriptor).map(|_| ())
    }

    async fn credential(&self, descriptor: &ClusterDescriptor) -> Result<Credential, AuthError> {
        let config = Self::config(descriptor)?;
        let address = config.address()?;
        debug!(%address, audience = %config.audience, "fetching JWT-SVID");

        let token = self
            .source
            .fetch_jwt_svid(&address, &config.audience)
            .await
            .map_err(|err| AuthError::invocation(self.name.clone(), err))?;

        let mut credential = Credential::token(token.as_str());
        credential.expires_at = jwt_expiry(&token);
        Ok(credential)
    }
}

#[derive(Deserialize)]
struct Claims {
    exp: Option<i64>,
}

/// `exp` claim of an unverified JWT
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = match serde_json::from_slice(&decoded) {
        Ok(claims) => claims,
        Err(err) => {
            trace!(%err, "jwt payload is not json");
            return None;
        }
    };
    DateTime::from_timestamp(claims.exp?, 0)
}

use async_trait::async_trait;
use spiffe::WorkloadApiClient;
use tracing::trace;

use crate::AuthError;

use super::JwtSvidSource;

/// [`JwtSvidSource`] backed by the SPIFFE workload API
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkloadApiSource;

#[async_trait]
impl JwtSvidSource for WorkloadApiSource {
    async fn fetch_jwt_svid(&self, address: &str, audience: &str) -> Result<String, AuthError> {
        trace!(address, "connecting to workload API");
        let mut client = WorkloadApiClient::new_from_path(address)
            .await
            .map_err(|err| {
                AuthError::configuration(format!(
                    "failed to connect to SPIFFE workload API at {address}: {err}"
                ))
            })?;

        let audiences = [audience.to_owned()];
        let svid = client
            .fetch_jwt_svid(&audiences, None)
            .await
            .map_err(|err| AuthError::invocation("spiffe", format!("failed to fetch JWT-SVID: {err}")))?;
        Ok(svid.token().to_owned())
    }
}

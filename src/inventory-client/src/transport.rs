use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::header::HeaderValue;
use http::header::AUTHORIZATION;
use http::StatusCode;
use hyper::client::connect::Connect;
use hyper::Body;
use hyper::Client;
use hyper::Request;
use hyper::Response;
use tracing::debug;
use tracing::error;
use tracing::trace;

use crate::AuthError;
use crate::Authenticator;

/// sends one request
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, AuthError>;
}

#[async_trait]
impl<C> HttpTransport for Client<C, Body>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async fn round_trip(&self, request: Request<Body>) -> Result<Response<Body>, AuthError> {
        Ok(self.request(request).await?)
    }
}

/// Adds the session's bearer token to requests and invalidates the credential
/// a request used when the server answers 401.
pub struct AuthRoundTripper<T> {
    inner: T,
    authenticator: Arc<Authenticator>,
}

impl<T> AuthRoundTripper<T> {
    pub fn new(inner: T, authenticator: Arc<Authenticator>) -> Self {
        Self {
            inner,
            authenticator,
        }
    }

    pub fn authenticator(&self) -> &Arc<Authenticator> {
        &self.authenticator
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl<T> fmt::Debug for AuthRoundTripper<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRoundTripper")
            .field("authenticator", &self.authenticator)
            .finish()
    }
}

#[async_trait]
impl<T> HttpTransport for AuthRoundTripper<T>
where
    T: HttpTransport,
{
    async fn round_trip(&self, mut request: Request<Body>) -> Result<Response<Body>, AuthError> {
        if request.headers().contains_key(AUTHORIZATION) {
            trace!("request carries its own authorization");
            return self.inner.round_trip(request).await;
        }

        let credential = self.authenticator.get_credential().await?;
        if let Some(token) = credential.token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let response = self.inner.round_trip(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!(provider = %self.authenticator.provider_name(), "server answered 401");
            if let Err(err) = self.authenticator.invalidate(&credential).await {
                error!(%err, "failed to refresh credential after 401");
            }
        }
        Ok(response)
    }
}

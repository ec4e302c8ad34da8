use std::io::Error as IoError;

use http::header::InvalidHeaderValue;
use http::Error as HttpError;
use hyper::Error as HyperError;
use thiserror::Error;

use inventory_config::ConfigError;
use inventory_types::MetaStatus;

#[derive(Error, Debug)]
pub enum AuthError {
    /// invalid or incomplete configuration, raised while building configs
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no matching provider for cluster profile {profile}")]
    NoMatchingProvider { profile: String },
    /// credential provider could not be run or failed
    #[error("provider {provider} failed: {message}")]
    ProviderInvocation { provider: String, message: String },
    #[error("malformed credential: {0}")]
    MalformedCredential(String),
    #[error("unsupported exec credential api version {found}, expected {expected}")]
    UnsupportedSchemaVersion { found: String, expected: String },
    /// one half of a client certificate/key pair is missing
    #[error("client certificate and key must both be present: {0}")]
    Pairing(String),
    #[error("Http error: {0}")]
    Http(#[from] HttpError),
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),
    #[error("Hyper error: {0}")]
    Hyper(#[from] HyperError),
    #[error("IO error: {0}")]
    Io(#[from] IoError),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("kube config error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Api(#[from] MetaStatus),
}

impl AuthError {
    pub fn invocation<P: Into<String>, M: ToString>(provider: P, message: M) -> Self {
        Self::ProviderInvocation {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    pub fn configuration<M: Into<String>>(message: M) -> Self {
        Self::Configuration(message.into())
    }

    pub fn malformed<M: Into<String>>(message: M) -> Self {
        Self::MalformedCredential(message.into())
    }

    /// api error with status code 404
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(status) if status.code == Some(404))
    }
}

use base64::DecodeError;
use serde_json::Error as SerdeJsonError;
use serde_yaml::Error as SerdeYamlError;
use std::io::Error as IoError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] IoError),
    #[error("Yaml error: {0}")]
    SerdeError(#[from] SerdeYamlError),
    #[error("Json error: {0}")]
    JsonError(#[from] SerdeJsonError),
    #[error("base64 decoding error: {0}")]
    Base64Error(#[from] DecodeError),
    #[error("No active Kubernetes context")]
    NoCurrentContext,
    #[error("not running inside a Kubernetes cluster: {0}")]
    NotInCluster(String),
    #[error("Unknown error: {0}")]
    Other(String),
}

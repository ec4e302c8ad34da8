use std::env;
use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::trace;

use crate::ConfigError;

pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
pub const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
pub const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";

const TOKEN_FILE: &str = "token";
const CA_FILE: &str = "ca.crt";
const NAMESPACE_FILE: &str = "namespace";

/// configuration when running as a pod inside the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodConfig {
    pub host: String,
    pub port: String,
    pub namespace: String,
    account_dir: PathBuf,
}

impl PodConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let host = env::var(SERVICE_HOST_ENV)
            .map_err(|_| ConfigError::NotInCluster(format!("{SERVICE_HOST_ENV} not set")))?;
        let port = env::var(SERVICE_PORT_ENV)
            .map_err(|_| ConfigError::NotInCluster(format!("{SERVICE_PORT_ENV} not set")))?;
        Self::load_from(SERVICE_ACCOUNT_DIR, host, port)
    }

    /// load service account files from `account_dir`
    pub fn load_from<P: AsRef<Path>>(
        account_dir: P,
        host: String,
        port: String,
    ) -> Result<Self, ConfigError> {
        let account_dir = account_dir.as_ref().to_path_buf();
        let token_path = account_dir.join(TOKEN_FILE);
        if !token_path.exists() {
            return Err(ConfigError::NotInCluster(format!(
                "service account token not found at {}",
                token_path.display()
            )));
        }
        let namespace = read_to_string(account_dir.join(NAMESPACE_FILE))?
            .trim()
            .to_owned();
        debug!(%host, %port, %namespace, "loaded pod config");
        Ok(Self {
            host,
            port,
            namespace,
            account_dir,
        })
    }

    pub fn api_path(&self) -> String {
        if self.host.contains(':') {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }

    pub fn token_path(&self) -> PathBuf {
        self.account_dir.join(TOKEN_FILE)
    }

    pub fn ca_path(&self) -> PathBuf {
        self.account_dir.join(CA_FILE)
    }

    /// current service account token; re-read on each call since the kubelet rotates it
    pub fn token(&self) -> Result<String, ConfigError> {
        let token = read_to_string(self.token_path())?;
        trace!("read service account token");
        Ok(token.trim().to_owned())
    }
}

/// namespace from the service account mount, if any
pub fn service_account_namespace<P: AsRef<Path>>(account_dir: P) -> Option<String> {
    read_to_string(account_dir.as_ref().join(NAMESPACE_FILE))
        .ok()
        .map(|ns| ns.trim().to_owned())
        .filter(|ns| !ns.is_empty())
}

use std::env;
use std::fs::read;
use std::fs::File;
use std::io::Result as IoResult;
use std::path::Path;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use dirs::home_dir;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::ConfigError;
use crate::ExecConfig;

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub name: String,
    pub cluster: ClusterDetail,
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_compression: Option<bool>,
    pub server: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<NamedExtension>,
}

impl ClusterDetail {
    /// CA bundle, inline data first then the referenced file
    pub fn ca(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        if let Some(data) = &self.certificate_authority_data {
            debug!("detected in-line cluster CA certs");
            return Ok(Some(STANDARD.decode(data.trim())?));
        }
        match &self.certificate_authority {
            Some(path) => {
                debug!(%path, "loading cluster CA");
                Ok(Some(read(path)?))
            }
            None => Ok(None),
        }
    }

    pub fn insecure(&self) -> bool {
        self.insecure_skip_tls_verify.unwrap_or(false)
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct NamedExtension {
    pub name: String,
    #[serde(default)]
    pub extension: Value,
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct Context {
    pub name: String,
    pub context: ContextDetail,
}

#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct ContextDetail {
    pub cluster: String,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ContextDetail {
    pub fn namespace(&self) -> &str {
        match &self.namespace {
            Some(nm) => nm,
            None => "default",
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub user: UserDetail,
}

#[derive(Debug, Eq, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(rename = "tokenFile", skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_provider: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserDetail {
    /// static bearer token, inline first then token file
    pub fn bearer_token(&self) -> IoResult<Option<String>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        match &self.token_file {
            Some(path) => Ok(Some(std::fs::read_to_string(path)?.trim().to_owned())),
            None => Ok(None),
        }
    }

    /// decoded client certificate and key PEM, inline data first then referenced files
    pub fn client_identity(&self) -> Result<Option<(Vec<u8>, Vec<u8>)>, ConfigError> {
        if let Some(cert_data) = &self.client_certificate_data {
            let key_data = self.client_key_data.as_ref().ok_or_else(|| {
                ConfigError::Other("current user must have client key data".to_owned())
            })?;
            return Ok(Some((
                STANDARD.decode(cert_data.trim())?,
                STANDARD.decode(key_data.trim())?,
            )));
        }
        if let Some(cert_path) = &self.client_certificate {
            let key_path = self.client_key.as_ref().ok_or_else(|| {
                ConfigError::Other("current user must have client key".to_owned())
            })?;
            debug!(%cert_path, %key_path, "loading client certificate");
            return Ok(Some((read(cert_path)?, read(key_path)?)));
        }
        Ok(None)
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KubeConfig {
    #[serde(skip)]
    pub path: PathBuf,
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub contexts: Vec<Context>,
    #[serde(default)]
    pub current_context: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<NamedExtension>,
}

impl KubeConfig {
    /// read from default home directory
    pub fn from_home() -> Result<Self, ConfigError> {
        let home_dir = home_dir()
            .ok_or_else(|| ConfigError::Other("home directory not found".to_owned()))?;
        Self::from_file(home_dir.join(".kube").join("config"))
    }

    /// first path of `KUBECONFIG`, otherwise `~/.kube/config`
    pub fn load_default() -> Result<Self, ConfigError> {
        match env::var_os(KUBECONFIG_ENV) {
            Some(paths) => match env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
                Some(path) => Self::from_file(path),
                None => Self::from_home(),
            },
            None => Self::from_home(),
        }
    }

    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let file = File::open(path.as_ref())?;
        let mut config: Self = serde_yaml::from_reader(file)?;
        config.path = path.as_ref().to_path_buf();
        Ok(config)
    }

    /// parse kubeconfig content, as stored in a Secret
    pub fn from_bytes(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_slice(data)?)
    }

    pub fn to_file<T: AsRef<Path>>(&self, path: T) -> Result<(), ConfigError> {
        let file = File::create(path)?;
        Ok(serde_yaml::to_writer(file, self)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.to_file(&self.path)
    }

    pub fn context(&self, name: &str) -> Option<&Context> {
        self.contexts.iter().find(|c| c.name == name)
    }

    pub fn cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    pub fn user(&self, name: &str) -> Option<&User> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn current_context(&self) -> Option<&Context> {
        self.context(&self.current_context)
    }

    pub fn current_cluster(&self) -> Option<&Cluster> {
        self.current_context()
            .and_then(|ctx| self.cluster(&ctx.context.cluster))
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current_context()
            .and_then(|ctx| self.user(&ctx.context.user))
    }

    pub fn put_user(&mut self, user: User) -> Option<User> {
        let prev = self.users.iter_mut().find(|u| u.name.eq(&user.name));
        match prev {
            Some(prev) => Some(std::mem::replace(prev, user)),
            None => {
                self.users.push(user);
                None
            }
        }
    }

    pub fn put_cluster(&mut self, cluster: Cluster) -> Option<Cluster> {
        let prev = self.clusters.iter_mut().find(|c| c.name.eq(&cluster.name));
        match prev {
            Some(prev) => Some(std::mem::replace(prev, cluster)),
            None => {
                self.clusters.push(cluster);
                None
            }
        }
    }

    pub fn put_context(&mut self, context: Context) -> Option<Context> {
        let prev = self.contexts.iter_mut().find(|c| c.name.eq(&context.name));
        match prev {
            Some(prev) => Some(std::mem::replace(prev, context)),
            None => {
                self.contexts.push(context);
                None
            }
        }
    }
}

#[cfg(test)]
mod test {

    use crate::{Cluster, Context, User};

    use super::KubeConfig;

    #[test]
    fn test_decode_default_config() {
        let config =
            KubeConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data/kubeconfig.yaml"))
                .expect("read");
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.kind, "Config");
        assert_eq!(config.current_context, "hub");
        assert_eq!(config.clusters.len(), 2);
        let cluster = &config.clusters[0].cluster;
        assert_eq!(cluster.server, "https://hub.example.com:6443");
        assert_eq!(cluster.ca().expect("ca").expect("present"), b"ca-bytes");
        assert_eq!(config.contexts.len(), 3);
        let ctx = &config.contexts[0].context;
        assert_eq!(ctx.cluster, "hub");
        assert_eq!(ctx.namespace.as_ref().unwrap(), "fleet-system");

        let current_cluster = config.current_cluster().expect("current");
        assert_eq!(current_cluster.name, "hub");
        let current_user = config.current_user().expect("user");
        assert_eq!(
            current_user.user.bearer_token().expect("token").as_deref(),
            Some("hub-token")
        );
    }

    #[test]
    fn test_decode_exec_and_cert_users() {
        let config =
            KubeConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data/kubeconfig.yaml"))
                .expect("read");

        let exec = config
            .user("exec-user")
            .and_then(|u| u.user.exec.as_ref())
            .expect("exec");
        assert_eq!(exec.command, "token-helper");
        assert_eq!(exec.args, vec!["get-token".to_owned()]);
        assert_eq!(exec.env[0].name, "REGION");

        let cert_user = config.user("cert-user").expect("cert user");
        let (cert, key) = cert_user
            .user
            .client_identity()
            .expect("decode")
            .expect("identity");
        assert_eq!(cert, b"cert-pem");
        assert_eq!(key, b"key-pem");
    }

    #[test]
    fn test_token_file() {
        //given
        let dir = tempfile::tempdir().expect("tempdir");
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "from-file\n").expect("write");
        let user = crate::UserDetail {
            token_file: Some(token_path.to_string_lossy().into_owned()),
            ..Default::default()
        };

        //when
        let token = user.bearer_token().expect("read");

        //then
        assert_eq!(token.as_deref(), Some("from-file"));
    }

    #[test]
    fn test_from_bytes_round_trip() {
        //given
        let config =
            KubeConfig::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/data/kubeconfig.yaml"))
                .expect("read");

        //when
        let serialized = serde_yaml::to_string(&config).expect("serialized");
        let parsed = KubeConfig::from_bytes(serialized.as_bytes()).expect("parse");

        //then
        assert_eq!(parsed.current_context, config.current_context);
        assert_eq!(parsed.users, config.users);
    }

    #[test]
    fn test_put_user() {
        //given
        let mut config = KubeConfig::default();

        let user1 = User {
            name: "user1".to_string(),
            user: crate::UserDetail {
                username: Some("username1".to_string()),
                ..Default::default()
            },
        };

        let user1_2 = User {
            name: "user1".to_string(),
            user: crate::UserDetail {
                username: Some("username2".to_string()),
                ..Default::default()
            },
        };

        let user2 = User {
            name: "user2".to_string(),
            user: Default::default(),
        };

        //when
        assert!(config.put_user(user1).is_none());
        assert!(config.put_user(user2).is_none());

        let prev = config.put_user(user1_2);
        assert!(prev.is_some());
        assert_eq!(prev.unwrap().user.username.unwrap(), "username1");
    }

    #[test]
    fn test_put_cluster_and_context() {
        //given
        let mut config = KubeConfig::default();

        let cluster = Cluster {
            name: "east".to_string(),
            cluster: crate::ClusterDetail {
                server: "https://east".to_string(),
                ..Default::default()
            },
        };
        let context = Context {
            name: "east".to_string(),
            context: crate::ContextDetail {
                cluster: "east".to_string(),
                user: "east".to_string(),
                ..Default::default()
            },
        };

        //when
        assert!(config.put_cluster(cluster.clone()).is_none());
        assert!(config.put_context(context).is_none());
        config.current_context = "east".to_owned();

        //then
        assert_eq!(config.current_cluster(), Some(&cluster));
        assert_eq!(
            config.current_context().map(|c| c.context.namespace()),
            Some("default")
        );
        assert!(config.put_cluster(cluster).is_some());
    }
}

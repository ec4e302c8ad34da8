use std::fs::read;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::ConfigError;
use crate::ExecConfig;

/// default location of the credential provider file
pub const DEFAULT_PROVIDER_FILE: &str = "clusterprofile-provider-file.json";

/// Whether cluster extensions may add CLI args and env vars to a provider's exec config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExtensionFlag {
    #[default]
    Ignore,
    Allow,
}

impl TryFrom<u8> for ExtensionFlag {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ignore),
            1 => Ok(Self::Allow),
            other => Err(format!("invalid extension flag: {other}")),
        }
    }
}

impl From<ExtensionFlag> for u8 {
    fn from(flag: ExtensionFlag) -> Self {
        match flag {
            ExtensionFlag::Ignore => 0,
            ExtensionFlag::Allow => 1,
        }
    }
}

/// one exec credential provider known to the consumer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub name: String,
    pub exec_config: ExecConfig,
    #[serde(
        rename = "additionalCLIArgEnvVarExtensionFlag",
        default,
        skip_serializing_if = "is_ignore"
    )]
    pub extension_flag: ExtensionFlag,
}

fn is_ignore(flag: &ExtensionFlag) -> bool {
    *flag == ExtensionFlag::Ignore
}

impl ProviderSpec {
    pub fn new<N: Into<String>>(name: N, exec_config: ExecConfig) -> Self {
        Self {
            name: name.into(),
            exec_config,
            extension_flag: ExtensionFlag::Ignore,
        }
    }

    pub fn allow_extensions(mut self) -> Self {
        self.extension_flag = ExtensionFlag::Allow;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProviderFile {
    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

impl ProviderFile {
    pub fn from_file<T: AsRef<Path>>(path: T) -> Result<Self, ConfigError> {
        let data = read(path.as_ref())?;
        let file = Self::from_slice(&data)?;
        debug!(
            path = %path.as_ref().display(),
            providers = file.providers.len(),
            "loaded provider file"
        );
        Ok(file)
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// first provider with this name
    pub fn provider(&self, name: &str) -> Option<&ProviderSpec> {
        if name.is_empty() {
            return None;
        }
        self.providers.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod test {

    use std::fs::write;

    use super::ExtensionFlag;
    use super::ProviderFile;

    const PROVIDERS: &str = r#"{
        "providers": [
            {
                "name": "test-provider-1",
                "execConfig": {
                    "command": "test-command-1",
                    "args": ["arg1", "arg2"],
                    "apiVersion": "client.authentication.k8s.io/v1"
                }
            },
            {
                "name": "test-provider-2",
                "execConfig": {
                    "command": "test-command-2",
                    "apiVersion": "client.authentication.k8s.io/v1beta1"
                },
                "additionalCLIArgEnvVarExtensionFlag": 1
            }
        ]
    }"#;

    #[test]
    fn test_from_file() {
        //given
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("providers.json");
        write(&path, PROVIDERS).expect("write");

        //when
        let file = ProviderFile::from_file(&path).expect("load");

        //then
        assert_eq!(file.providers.len(), 2);
        let first = file.provider("test-provider-1").expect("first");
        assert_eq!(first.exec_config.command, "test-command-1");
        assert_eq!(first.exec_config.args, vec!["arg1", "arg2"]);
        assert_eq!(first.extension_flag, ExtensionFlag::Ignore);
        assert_eq!(
            file.provider("test-provider-2").map(|p| p.extension_flag),
            Some(ExtensionFlag::Allow)
        );
        assert!(file.provider("missing").is_none());
        assert!(file.provider("").is_none());
    }

    #[test]
    fn test_invalid_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(ProviderFile::from_file(dir.path().join("missing.json")).is_err());

        let invalid = dir.path().join("invalid.json");
        write(&invalid, "invalid json content").expect("write");
        assert!(ProviderFile::from_file(&invalid).is_err());

        let empty = ProviderFile::from_slice(b"{}").expect("empty");
        assert!(empty.providers.is_empty());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        let data = r#"{"providers":[{"name":"p","execConfig":{"command":"c"},"additionalCLIArgEnvVarExtensionFlag":7}]}"#;
        assert!(ProviderFile::from_slice(data.as_bytes()).is_err());
    }
}

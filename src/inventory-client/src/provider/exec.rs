use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;
use tracing::trace;

use inventory_config::ExecConfig;
use inventory_config::ExtensionFlag;
use inventory_config::ProviderSpec;
use inventory_types::cluster_profile::ADDITIONAL_CLI_ARGS_EXTENSION_KEY;
use inventory_types::cluster_profile::ADDITIONAL_ENV_VARS_EXTENSION_KEY;
use inventory_types::exec_credential::is_supported_api_version;
use inventory_types::exec_credential::ExecCredential;
use inventory_types::exec_credential::EXEC_CREDENTIAL_KIND;
use inventory_types::exec_credential::KUBERNETES_EXEC_INFO;

use crate::AuthError;
use crate::ClusterDescriptor;
use crate::Credential;

use super::CredentialProvider;

/// runs an external credential plugin
#[derive(Debug, Clone)]
pub struct ExecProvider {
    name: String,
    config: ExecConfig,
    extension_flag: ExtensionFlag,
    timeout: Option<Duration>,
}

impl ExecProvider {
    pub fn new<N: Into<String>>(name: N, config: ExecConfig) -> Self {
        Self {
            name: name.into(),
            config,
            extension_flag: ExtensionFlag::Ignore,
            timeout: None,
        }
    }

    pub fn from_spec(spec: &ProviderSpec) -> Self {
        Self::new(spec.name.clone(), spec.exec_config.clone())
            .with_extension_flag(spec.extension_flag)
    }

    pub fn with_extension_flag(mut self, flag: ExtensionFlag) -> Self {
        self.extension_flag = flag;
        self
    }

    /// kill the plugin when it runs longer than `limit`; unlimited by default
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// exec config for `descriptor`, with extension supplied args and env applied when allowed
    pub fn command_config(&self, descriptor: &ClusterDescriptor) -> Result<ExecConfig, AuthError> {
        let mut config = self.config.clone();
        if self.extension_flag == ExtensionFlag::Ignore {
            return Ok(config);
        }

        if let Some(payload) = descriptor.extension(ADDITIONAL_CLI_ARGS_EXTENSION_KEY) {
            let args: Vec<String> = serde_json::from_value(payload.clone()).map_err(|err| {
                AuthError::configuration(format!("invalid additional args extension: {err}"))
            })?;
            config.args.extend(args);
        }

        if let Some(payload) = descriptor.extension(ADDITIONAL_ENV_VARS_EXTENSION_KEY) {
            let envs: BTreeMap<String, String> =
                serde_json::from_value(payload.clone()).map_err(|err| {
                    AuthError::configuration(format!("invalid additional envs extension: {err}"))
                })?;
            for (name, value) in envs {
                config.set_env(name, value);
            }
        }

        Ok(config)
    }

    fn exec_info(&self, descriptor: &ClusterDescriptor) -> Result<String, AuthError> {
        let cluster = if self.config.provide_cluster_info {
            Some(descriptor.to_exec_cluster())
        } else {
            None
        };
        let request = ExecCredential::request(self.config.api_version.clone(), cluster);
        Ok(serde_json::to_string(&request)?)
    }

    fn failure<M: ToString>(&self, message: M) -> AuthError {
        let mut message = message.to_string();
        if let Some(hint) = &self.config.install_hint {
            message.push_str(&format!("\n{hint}"));
        }
        AuthError::invocation(self.name.clone(), message)
    }

    fn decode(&self, stdout: &[u8]) -> Result<Credential, AuthError> {
        let response: ExecCredential = serde_json::from_slice(stdout).map_err(|err| {
            AuthError::malformed(format!("decoding output of {}: {err}", self.name))
        })?;

        if response.kind != EXEC_CREDENTIAL_KIND {
            return Err(AuthError::malformed(format!(
                "plugin returned kind {}, expected {EXEC_CREDENTIAL_KIND}",
                response.kind
            )));
        }
        if !is_supported_api_version(&response.api_version)
            || response.api_version != self.config.api_version
        {
            return Err(AuthError::UnsupportedSchemaVersion {
                found: response.api_version,
                expected: self.config.api_version.clone(),
            });
        }

        let status = response
            .status
            .ok_or_else(|| AuthError::malformed("exec plugin did not return a status"))?;
        Ok(status.into())
    }
}

#[async_trait]
impl CredentialProvider for ExecProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn prepare(&self, descriptor: &ClusterDescriptor) -> Result<(), AuthError> {
        if self.config.command.is_empty() {
            return Err(AuthError::configuration(format!(
                "exec provider {} has no command",
                self.name
            )));
        }
        if !is_supported_api_version(&self.config.api_version) {
            return Err(AuthError::configuration(format!(
                "exec provider {} has unsupported apiVersion {:?}",
                self.name, self.config.api_version
            )));
        }
        self.command_config(descriptor).map(|_| ())
    }

    async fn credential(&self, descriptor: &ClusterDescriptor) -> Result<Credential, AuthError> {
        let config = self.command_config(descriptor)?;
        let exec_info = self.exec_info(descriptor)?;

        debug!(provider = %self.name, command = %config.command, args = ?config.args, "running exec plugin");
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(config.env.iter().map(|env| (&env.name, &env.value)))
            .env(KUBERNETES_EXEC_INFO, exec_info)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => timeout(limit, command.output())
                .await
                .map_err(|_| self.failure(format!("timed out after {limit:?}")))?,
            None => command.output().await,
        }
        .map_err(|err| self.failure(format!("failed to run {}: {err}", config.command)))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            trace!(provider = %self.name, stderr = %stderr.trim(), "plugin stderr");
        }
        if !output.status.success() {
            return Err(self.failure(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        self.decode(&output.stdout)
    }
}

use serde::Deserialize;
use serde::Serialize;

/// how to run a credential plugin
///
/// Field names follow the kubeconfig `user.exec` block. Pascal case aliases accept
/// provider files written by tools that serialize the untagged Go structure.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    #[serde(alias = "Command")]
    pub command: String,
    #[serde(default, alias = "Args", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, alias = "Env", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<ExecEnvVar>,
    #[serde(default, alias = "APIVersion")]
    pub api_version: String,
    #[serde(default, alias = "InstallHint", skip_serializing_if = "Option::is_none")]
    pub install_hint: Option<String>,
    #[serde(default, alias = "ProvideClusterInfo")]
    pub provide_cluster_info: bool,
    #[serde(default, alias = "InteractiveMode", skip_serializing_if = "Option::is_none")]
    pub interactive_mode: Option<InteractiveMode>,
}

impl ExecConfig {
    pub fn new<C: Into<String>, V: Into<String>>(command: C, api_version: V) -> Self {
        Self {
            command: command.into(),
            api_version: api_version.into(),
            ..Default::default()
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.env.push(ExecEnvVar {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn provide_cluster_info(mut self, provide: bool) -> Self {
        self.provide_cluster_info = provide;
        self
    }

    /// set an env entry, replacing an existing one with the same name
    pub fn set_env<N: Into<String>, V: Into<String>>(&mut self, name: N, value: V) {
        let name = name.into();
        let value = value.into();
        match self.env.iter_mut().find(|env| env.name == name) {
            Some(env) => env.value = value,
            None => self.env.push(ExecEnvVar { name, value }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecEnvVar {
    #[serde(alias = "Name")]
    pub name: String,
    #[serde(alias = "Value")]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractiveMode {
    Never,
    IfAvailable,
    Always,
}

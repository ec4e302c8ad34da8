use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Crd;
use crate::CrdNames;
use crate::DefaultHeader;
use crate::Spec;
use crate::Status;
use crate::MULTICLUSTER_GROUP;
use crate::MULTICLUSTER_VERSION;

const CLUSTER_PROFILE_API: Crd = Crd {
    group: MULTICLUSTER_GROUP,
    version: MULTICLUSTER_VERSION,
    names: CrdNames {
        kind: "ClusterProfile",
        plural: "clusterprofiles",
        singular: "clusterprofile",
    },
};

pub const CONDITION_CONTROL_PLANE_HEALTHY: &str = "ControlPlaneHealthy";

pub const LABEL_CLUSTER_MANAGER_KEY: &str = "x-k8s.io/cluster-manager";
pub const LABEL_CLUSTER_SET_KEY: &str = "multicluster.x-k8s.io/clusterset";

/// reserved cluster extension whose payload becomes the exec `spec.cluster.config`
pub const CLUSTER_EXEC_EXTENSION_KEY: &str = "client.authentication.k8s.io/exec";
pub const ADDITIONAL_CLI_ARGS_EXTENSION_KEY: &str =
    "multicluster.x-k8s.io/clusterprofiles/auth/exec/additional-args";
pub const ADDITIONAL_ENV_VARS_EXTENSION_KEY: &str =
    "multicluster.x-k8s.io/clusterprofiles/auth/exec/additional-envs";

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProfileSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default)]
    pub cluster_manager: ClusterManager,
}

impl Spec for ClusterProfileSpec {
    type Status = ClusterProfileStatus;
    type Header = DefaultHeader;

    fn metadata() -> &'static Crd {
        &CLUSTER_PROFILE_API
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct ClusterManager {
    pub name: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterProfileStatus {
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "ClusterVersion::is_empty")]
    pub version: ClusterVersion,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    /// legacy provider list, superseded by `access_providers`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub credential_providers: Vec<AccessProvider>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub access_providers: Vec<AccessProvider>,
}

impl Status for ClusterProfileStatus {}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub ty: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClusterVersion {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub kubernetes: String,
}

impl ClusterVersion {
    fn is_empty(&self) -> bool {
        self.kubernetes.is_empty()
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed_time: Option<String>,
}

/// one way of reaching the cluster, keyed by provider name
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct AccessProvider {
    pub name: String,
    #[serde(default, alias = "cluster")]
    pub config: ProviderConfig,
}

/// connection metadata of a cluster, in kubeconfig `cluster` form
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct ProviderConfig {
    pub server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_server_name: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub insecure_skip_tls_verify: bool,
    #[serde(
        with = "crate::base64_bytes::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_compression: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<NamedExtension>,
}

impl ProviderConfig {
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.extensions
            .iter()
            .find(|ext| ext.name == name)
            .map(|ext| &ext.extension)
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
pub struct NamedExtension {
    pub name: String,
    #[serde(default)]
    pub extension: Value,
}

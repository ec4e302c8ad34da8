//! `client.authentication.k8s.io` ExecCredential, exchanged with credential plugins

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// environment variable carrying the serialized request to the plugin
pub const KUBERNETES_EXEC_INFO: &str = "KUBERNETES_EXEC_INFO";

pub const EXEC_CREDENTIAL_KIND: &str = "ExecCredential";
pub const EXEC_API_VERSION_V1: &str = "client.authentication.k8s.io/v1";
pub const EXEC_API_VERSION_V1BETA1: &str = "client.authentication.k8s.io/v1beta1";

/// api versions a plugin may answer with
pub const SUPPORTED_EXEC_API_VERSIONS: [&str; 2] = [EXEC_API_VERSION_V1, EXEC_API_VERSION_V1BETA1];

pub fn is_supported_api_version(api_version: &str) -> bool {
    SUPPORTED_EXEC_API_VERSIONS.contains(&api_version)
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredential {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub spec: ExecCredentialSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecCredentialStatus>,
}

impl ExecCredential {
    /// request sent to a plugin
    pub fn request<V: Into<String>>(api_version: V, cluster: Option<ExecCluster>) -> Self {
        Self {
            api_version: api_version.into(),
            kind: EXEC_CREDENTIAL_KIND.to_owned(),
            spec: ExecCredentialSpec {
                cluster,
                interactive: false,
            },
            status: None,
        }
    }

    /// response written by a plugin
    pub fn response<V: Into<String>>(api_version: V, status: ExecCredentialStatus) -> Self {
        Self {
            api_version: api_version.into(),
            kind: EXEC_CREDENTIAL_KIND.to_owned(),
            spec: ExecCredentialSpec::default(),
            status: Some(status),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ExecCluster>,
    #[serde(default)]
    pub interactive: bool,
}

/// cluster information handed to the plugin
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExecCluster {
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
}

#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecCredentialStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_key_data: Option<String>,
}

#[cfg(test)]
mod test {

    use chrono::TimeZone;
    use chrono::Utc;

    use super::ExecCluster;
    use super::ExecCredential;
    use super::ExecCredentialStatus;

    #[test]
    fn test_request_encoding() {
        let request = ExecCredential::request(
            super::EXEC_API_VERSION_V1,
            Some(ExecCluster {
                server: "https://east.example.com".to_owned(),
                certificate_authority_data: Some(b"ca-bytes".to_vec()),
                ..Default::default()
            }),
        );

        let encoded = serde_json::to_value(&request).expect("encode");
        assert_eq!(
            encoded,
            serde_json::json!({
                "apiVersion": "client.authentication.k8s.io/v1",
                "kind": "ExecCredential",
                "spec": {
                    "cluster": {
                        "server": "https://east.example.com",
                        "certificate-authority-data": "Y2EtYnl0ZXM="
                    },
                    "interactive": false
                }
            })
        );
    }

    #[test]
    fn test_response_decoding() {
        let data = r#"{
            "apiVersion": "client.authentication.k8s.io/v1beta1",
            "kind": "ExecCredential",
            "status": {
                "token": "abcdefg",
                "expirationTimestamp": "2030-01-02T03:04:05Z"
            }
        }"#;

        let response: ExecCredential = serde_json::from_str(data).expect("decode");
        assert!(super::is_supported_api_version(&response.api_version));
        let status = response.status.expect("status");
        assert_eq!(status.token.as_deref(), Some("abcdefg"));
        assert_eq!(
            status.expiration_timestamp,
            Some(Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_unknown_version() {
        assert!(!super::is_supported_api_version(
            "client.authentication.k8s.io/v1alpha1"
        ));
        let status = ExecCredentialStatus::default();
        let response = ExecCredential::response("client.authentication.k8s.io/v1", status);
        assert_eq!(response.kind, "ExecCredential");
    }
}

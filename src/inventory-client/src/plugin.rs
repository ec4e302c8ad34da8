use std::env;
use std::io::Write;
use std::process::ExitCode;

use tracing::debug;

use inventory_types::exec_credential::ExecCredential;
use inventory_types::exec_credential::EXEC_API_VERSION_V1;
use inventory_types::exec_credential::EXEC_CREDENTIAL_KIND;
use inventory_types::exec_credential::KUBERNETES_EXEC_INFO;

use crate::provider::CredentialProvider;
use crate::AuthError;
use crate::ClusterDescriptor;

/// Answer one exec request: `info` is the `KUBERNETES_EXEC_INFO` payload,
/// the result is the ExecCredential response as a single JSON document.
pub async fn plugin_output(
    provider: &dyn CredentialProvider,
    info: &str,
) -> Result<String, AuthError> {
    let request: ExecCredential = serde_json::from_str(info).map_err(|err| {
        AuthError::configuration(format!("failed to read {KUBERNETES_EXEC_INFO}: {err}"))
    })?;
    if request.kind != EXEC_CREDENTIAL_KIND {
        return Err(AuthError::configuration(format!(
            "{KUBERNETES_EXEC_INFO} holds kind {:?}, expected {EXEC_CREDENTIAL_KIND}",
            request.kind
        )));
    }
    if request.api_version != EXEC_API_VERSION_V1 {
        return Err(AuthError::UnsupportedSchemaVersion {
            found: request.api_version,
            expected: EXEC_API_VERSION_V1.to_owned(),
        });
    }
    let cluster = request.spec.cluster.ok_or_else(|| {
        AuthError::configuration(format!(
            "spec.cluster.server is missing in {KUBERNETES_EXEC_INFO}"
        ))
    })?;
    let descriptor = ClusterDescriptor::from_exec_cluster(cluster)?;

    debug!(provider = provider.name(), server = %descriptor.server, "serving exec request");
    let credential = provider.credential(&descriptor).await?;
    let response = ExecCredential::response(EXEC_API_VERSION_V1, credential.into());
    Ok(serde_json::to_string(&response)?)
}

/// Run `provider` as an exec credential plugin.
///
/// The credential is printed on stdout as one line. Failures are printed on
/// stderr prefixed with the provider name.
pub async fn run_plugin(provider: &dyn CredentialProvider) -> ExitCode {
    let name = provider.name().trim();
    if name.is_empty() {
        eprintln!("[credentialplugin] provider name must not be empty");
        return ExitCode::FAILURE;
    }

    let info = match env::var(KUBERNETES_EXEC_INFO) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("[{name}] failed to read {KUBERNETES_EXEC_INFO}: {err}");
            return ExitCode::FAILURE;
        }
    };

    match plugin_output(provider, &info).await {
        Ok(output) => {
            let mut stdout = std::io::stdout().lock();
            if let Err(err) = writeln!(stdout, "{output}").and_then(|_| stdout.flush()) {
                eprintln!("[{name}] failed to write credential: {err}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("[{name}] {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod test {

    use serde_json::Value;

    use crate::provider::StaticProvider;
    use crate::AuthError;
    use crate::Credential;

    use super::plugin_output;

    const INFO: &str = r#"{
        "apiVersion": "client.authentication.k8s.io/v1",
        "kind": "ExecCredential",
        "spec": {
            "cluster": { "server": "https://east.example.com" },
            "interactive": false
        }
    }"#;

    #[tokio::test]
    async fn test_token_response() {
        let provider = StaticProvider::new("static", Credential::token("abc"));
        let output = plugin_output(&provider, INFO).await.expect("output");
        assert!(!output.contains('\n'));

        let value: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(value["apiVersion"], "client.authentication.k8s.io/v1");
        assert_eq!(value["kind"], "ExecCredential");
        assert_eq!(value["status"]["token"], "abc");
    }

    #[tokio::test]
    async fn test_missing_server() {
        let provider = StaticProvider::new("static", Credential::token("abc"));
        for info in [
            r#"{"apiVersion":"client.authentication.k8s.io/v1","kind":"ExecCredential","spec":{}}"#,
            r#"{"apiVersion":"client.authentication.k8s.io/v1","kind":"ExecCredential","spec":{"cluster":{"server":"null"}}}"#,
            r#"{"apiVersion":"client.authentication.k8s.io/v1","kind":"ExecCredential","spec":{"cluster":{"server":"  "}}}"#,
        ] {
            assert!(matches!(
                plugin_output(&provider, info).await,
                Err(AuthError::Configuration(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_rejects_beta_request() {
        let provider = StaticProvider::new("static", Credential::token("abc"));
        let info = INFO.replace("/v1\"", "/v1beta1\"");
        assert!(matches!(
            plugin_output(&provider, &info).await,
            Err(AuthError::UnsupportedSchemaVersion { .. })
        ));
    }
}

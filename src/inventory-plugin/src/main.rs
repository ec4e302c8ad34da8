use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use inventory_client::provider::SecretFormat;
use inventory_client::provider::SecretReaderProvider;
use inventory_client::provider::KUBECONFIG_SECRET_READER_PROVIDER;
use inventory_client::provider::SECRET_READER_PROVIDER;
use inventory_client::run_plugin;
use inventory_client::CredentialsProvider;
use inventory_client::KubeApiClient;
use inventory_config::infer_namespace;
use inventory_config::DEFAULT_PROVIDER_FILE;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::K8Obj;

/// Exec credential plugins for ClusterProfile consumers
#[derive(Debug, Parser)]
#[command(name = "inventory-plugin", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// bearer token read from a Secret on the hub cluster
    Secretreader(SecretArgs),
    /// client credentials read from a kubeconfig stored in a Secret on the hub cluster
    KubeconfigSecretreader(SecretArgs),
    /// JWT-SVID fetched from the SPIFFE workload API
    #[cfg(feature = "spiffe")]
    Spiffe,
    /// resolve a ClusterProfile manifest with a provider file and report the session
    Resolve(ResolveArgs),
}

#[derive(Debug, Args)]
struct SecretArgs {
    /// namespace holding the Secrets, inferred from kubeconfig or the service account when unset
    #[arg(long, env = "CLUSTER_INVENTORY_SECRET_NAMESPACE")]
    namespace: Option<String>,
}

#[derive(Debug, Args)]
struct ResolveArgs {
    #[arg(long = "clusterprofile-provider-file", default_value = DEFAULT_PROVIDER_FILE)]
    provider_file: PathBuf,
    /// ClusterProfile manifest, YAML or JSON
    #[arg(long)]
    profile: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the credential
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    debug!(?cli, "starting");

    match cli.command {
        Command::Secretreader(args) => match secret_reader(&args, SecretFormat::Token) {
            Ok(provider) => run_plugin(&provider).await,
            Err(err) => fail(SECRET_READER_PROVIDER, err),
        },
        Command::KubeconfigSecretreader(args) => {
            match secret_reader(&args, SecretFormat::Kubeconfig) {
                Ok(provider) => run_plugin(&provider).await,
                Err(err) => fail(KUBECONFIG_SECRET_READER_PROVIDER, err),
            }
        }
        #[cfg(feature = "spiffe")]
        Command::Spiffe => {
            use inventory_client::provider::SpiffeProvider;
            use inventory_client::provider::WorkloadApiSource;

            run_plugin(&SpiffeProvider::new(Arc::new(WorkloadApiSource))).await
        }
        Command::Resolve(args) => match resolve(&args).await {
            Ok(line) => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Err(err) => fail("resolve", err),
        },
    }
}

fn fail(name: &str, err: anyhow::Error) -> ExitCode {
    eprintln!("[{name}] {err:#}");
    ExitCode::FAILURE
}

fn secret_reader(args: &SecretArgs, format: SecretFormat) -> anyhow::Result<SecretReaderProvider> {
    let namespace = args.namespace.clone().unwrap_or_else(infer_namespace);
    let client = Arc::new(KubeApiClient::try_default().context("failed to configure hub client")?);
    debug!(%namespace, hub = client.host(), "reading secrets");

    Ok(match format {
        SecretFormat::Token => SecretReaderProvider::token(namespace, client.clone(), client),
        SecretFormat::Kubeconfig => SecretReaderProvider::kubeconfig(namespace, client),
    })
}

async fn resolve(args: &ResolveArgs) -> anyhow::Result<String> {
    let credentials = CredentialsProvider::from_file(&args.provider_file).with_context(|| {
        format!("failed to load provider file {}", args.provider_file.display())
    })?;
    let manifest = std::fs::read(&args.profile)
        .with_context(|| format!("failed to read {}", args.profile.display()))?;
    let profile: K8Obj<ClusterProfileSpec> = serde_yaml::from_slice(&manifest)?;

    let config = credentials.build_config_from_cp(&profile)?;
    let credential = config.authenticator.get_credential().await?;
    let report = serde_json::json!({
        "server": config.host,
        "provider": config.authenticator.provider_name(),
        "token": credential.token().is_some(),
        "clientCertificate": credential.client_chain().is_some(),
        "expirationTimestamp": credential.expires_at(),
    });
    Ok(report.to_string())
}

#[cfg(test)]
mod test {

    use clap::Parser;

    use super::Cli;
    use super::Command;

    #[test]
    fn test_plugin_names() {
        let cli = Cli::try_parse_from(["inventory-plugin", "kubeconfig-secretreader"]).expect("parse");
        assert!(matches!(cli.command, Command::KubeconfigSecretreader(_)));

        let cli = Cli::try_parse_from(["inventory-plugin", "secretreader", "--namespace", "fleet"])
            .expect("parse");
        match cli.command {
            Command::Secretreader(args) => assert_eq!(args.namespace.as_deref(), Some("fleet")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_resolve_defaults_provider_file() {
        let cli = Cli::try_parse_from(["inventory-plugin", "resolve", "--profile", "east.yaml"])
            .expect("parse");
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.provider_file.to_str(), Some(super::DEFAULT_PROVIDER_FILE));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

mod authenticator;
mod config;
mod connector;
mod credential;
mod descriptor;
mod error;
mod kube;
mod kubeconfig;
mod plugin;
mod registry;
mod resolver;
mod secret_config;
mod tracker;
mod transport;
mod uri;

pub mod provider;
pub mod tls;

pub use self::authenticator::Authenticator;
pub use self::authenticator::Clock;
pub use self::authenticator::SessionState;
pub use self::config::AuthenticatedClient;
pub use self::config::CredentialsProvider;
pub use self::config::RestConfig;
pub use self::connector::ClusterStream;
pub use self::connector::TrackingConnector;
pub use self::credential::Credential;
pub use self::credential::SessionCredential;
pub use self::descriptor::ClusterDescriptor;
pub use self::error::AuthError;
pub use self::kube::KubeApiClient;
pub use self::plugin::plugin_output;
pub use self::plugin::run_plugin;
pub use self::registry::ProviderRegistry;
pub use self::resolver::resolve;
pub use self::resolver::ResolvedProvider;
pub use self::secret_config::*;
pub use self::tracker::ConnectionTracker;
pub use self::tracker::DialTicket;
pub use self::tracker::TrackedStream;
pub use self::transport::AuthRoundTripper;
pub use self::transport::HttpTransport;
pub use self::uri::ListOptions;
pub use self::uri::NameSpace;

pub use inventory_config::K8Config;

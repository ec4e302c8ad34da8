use async_trait::async_trait;
use http::header::ACCEPT;
use http::Uri;
use hyper::Body;
use hyper::Request;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::error;
use tracing::trace;

use inventory_config::K8Config;
use inventory_types::cluster_profile::ClusterProfileSpec;
use inventory_types::core::namespace::NamespaceSpec;
use inventory_types::core::secret::SecretSpec;
use inventory_types::K8List;
use inventory_types::K8Obj;
use inventory_types::LabelSelector;
use inventory_types::MetaStatus;
use inventory_types::Spec;

use crate::config::AuthenticatedClient;
use crate::provider::ClusterProfileSource;
use crate::provider::SecretSource;
use crate::secret_config::LabelledSecrets;
use crate::transport::HttpTransport;
use crate::uri::item_uri;
use crate::uri::items_uri;
use crate::uri::ListOptions;
use crate::uri::NameSpace;
use crate::AuthError;
use crate::RestConfig;

/// Read-only client of the hub cluster API.
#[derive(Debug)]
pub struct KubeApiClient {
    client: AuthenticatedClient,
    host: String,
}

impl KubeApiClient {
    /// in-cluster config when running in a pod, otherwise the current kubeconfig context
    pub fn try_default() -> Result<Self, AuthError> {
        let config = K8Config::load()?;
        Self::new(&RestConfig::from_k8_config(&config)?)
    }

    pub fn new(config: &RestConfig) -> Result<Self, AuthError> {
        Ok(Self {
            client: config.build_client()?,
            host: config.host.clone(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    async fn handle_request<T>(&self, uri: Uri) -> Result<T, AuthError>
    where
        T: DeserializeOwned,
    {
        trace!(%uri, "request");
        let request = Request::get(uri)
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;
        let response = self.client.round_trip(request).await?;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await?;

        if status.is_success() {
            return serde_json::from_slice(&body).map_err(|err| {
                error!(%err, source = %String::from_utf8_lossy(&body), "json error");
                err.into()
            });
        }

        trace!(%status, "error response received");
        let api_status = serde_json::from_slice::<MetaStatus>(&body).unwrap_or_else(|_| MetaStatus {
            status: "Failure".to_owned(),
            message: Some(String::from_utf8_lossy(&body).trim().to_owned()),
            reason: status.canonical_reason().map(str::to_owned),
            ..Default::default()
        });
        Err(MetaStatus {
            code: api_status.code.or(Some(status.as_u16())),
            ..api_status
        }
        .into())
    }

    pub async fn retrieve_item<S>(&self, namespace: &str, name: &str) -> Result<K8Obj<S>, AuthError>
    where
        S: Spec,
    {
        let uri = item_uri::<S>(&self.host, name, namespace)?;
        debug!(kind = S::label(), namespace, name, "retrieving item");
        self.handle_request(uri).await
    }

    pub async fn retrieve_items<S>(
        &self,
        namespace: NameSpace,
        selector: Option<&LabelSelector>,
    ) -> Result<K8List<S>, AuthError>
    where
        S: Spec,
    {
        let options = selector.map(ListOptions::selecting);
        let uri = items_uri::<S>(&self.host, namespace, options.as_ref())?;
        debug!(kind = S::label(), %uri, "retrieving items");
        self.handle_request(uri).await
    }
}

#[async_trait]
impl SecretSource for KubeApiClient {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<K8Obj<SecretSpec>, AuthError> {
        self.retrieve_item::<SecretSpec>(namespace, name).await
    }
}

#[async_trait]
impl ClusterProfileSource for KubeApiClient {
    async fn list_cluster_profiles(&self) -> Result<Vec<K8Obj<ClusterProfileSpec>>, AuthError> {
        Ok(self
            .retrieve_items::<ClusterProfileSpec>(NameSpace::All, None)
            .await?
            .items)
    }
}

#[async_trait]
impl LabelledSecrets for KubeApiClient {
    async fn list_namespaces(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<K8Obj<NamespaceSpec>>, AuthError> {
        Ok(self
            .retrieve_items::<NamespaceSpec>(NameSpace::All, Some(selector))
            .await?
            .items)
    }

    async fn list_secrets(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<K8Obj<SecretSpec>>, AuthError> {
        Ok(self
            .retrieve_items::<SecretSpec>(NameSpace::from(namespace), Some(selector))
            .await?
            .items)
    }
}

#[cfg(test)]
mod test {

    use std::sync::Arc;

    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    use crate::provider::SecretSource;
    use crate::provider::StaticProvider;
    use crate::AuthError;
    use crate::ClusterDescriptor;
    use crate::Credential;
    use crate::RestConfig;

    use super::KubeApiClient;

    /// answers one request with `status` and `body`, returning the request head
    async fn respond(listener: TcpListener, status: &'static str, body: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut buf = vec![0u8; 4096];
        let n = socket.read(&mut buf).await.expect("read");
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.expect("write");
        String::from_utf8_lossy(&buf[..n]).to_string()
    }

    async fn client(listener: &TcpListener) -> KubeApiClient {
        let addr = listener.local_addr().expect("addr");
        let config = RestConfig::for_provider(
            Arc::new(StaticProvider::new("hub", Credential::token("hub-token"))),
            ClusterDescriptor::new(format!("http://{addr}")),
        )
        .expect("config");
        KubeApiClient::new(&config).expect("client")
    }

    #[tokio::test]
    async fn test_get_secret() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let client = client(&listener).await;
        let server = tokio::spawn(respond(
            listener,
            "200 OK",
            r#"{"apiVersion":"v1","kind":"Secret","metadata":{"name":"east","namespace":"fleet"},"data":{"token":"ZWFzdC10b2tlbg=="}}"#,
        ));

        let secret = client.get_secret("fleet", "east").await.expect("secret");
        let token = secret.header.decoded("token").expect("key").expect("base64");
        assert_eq!(token, b"east-token");

        let head = server.await.expect("server");
        assert!(head.starts_with("GET /api/v1/namespaces/fleet/secrets/east HTTP/1.1"));
        assert!(head.to_lowercase().contains("authorization: bearer hub-token"));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let client = client(&listener).await;
        let server = tokio::spawn(respond(
            listener,
            "404 Not Found",
            r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"secrets \"east\" not found","reason":"NotFound","code":404}"#,
        ));

        let err = client.get_secret("fleet", "east").await.expect_err("missing");
        assert!(err.is_not_found());
        assert!(matches!(err, AuthError::Api(_)));
        server.await.expect("server");
    }
}

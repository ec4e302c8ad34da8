use std::fmt;
use std::io::Result as IoResult;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use anyhow::anyhow;
use anyhow::Result;
use futures_util::future::Future;
use http::Uri;
use hyper::client::connect::Connected;
use hyper::client::connect::Connection;
use hyper::service::Service;
use rustls::ClientConfig;
use rustls::ServerName;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::io::ReadBuf;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use tracing::trace;

use crate::tracker::TrackedStream;
use crate::ConnectionTracker;

type Tracked = TrackedStream<TcpStream>;

pub enum ClusterStream {
    Plain(Tracked),
    Tls(Box<TlsStream<Tracked>>),
}

impl Connection for ClusterStream {
    fn connected(&self) -> Connected {
        Connected::new()
    }
}

impl AsyncRead for ClusterStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<IoResult<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ClusterStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<IoResult<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<IoResult<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// hyper connector that registers every dial with a [`ConnectionTracker`]
#[derive(Clone)]
pub struct TrackingConnector {
    tls: Arc<ClientConfig>,
    tls_server_name: Option<String>,
    proxy: Option<Uri>,
    tracker: Arc<ConnectionTracker>,
}

impl TrackingConnector {
    pub fn new(tls: ClientConfig, tracker: Arc<ConnectionTracker>) -> Self {
        Self {
            tls: Arc::new(tls),
            tls_server_name: None,
            proxy: None,
            tracker,
        }
    }

    /// name checked against the server certificate instead of the uri host
    pub fn with_server_name(mut self, name: Option<String>) -> Self {
        self.tls_server_name = name.filter(|name| !name.is_empty());
        self
    }

    /// tunnel every connection through an HTTP CONNECT proxy
    pub fn with_proxy(mut self, proxy_url: &str) -> Result<Self> {
        let proxy: Uri = proxy_url.parse()?;
        match proxy.scheme_str() {
            Some("http") | None => {}
            Some(scheme) => return Err(anyhow!("unsupported proxy scheme: {}", scheme)),
        }
        if proxy.host().is_none() {
            return Err(anyhow!("proxy url has no host: {}", proxy_url));
        }
        self.proxy = Some(proxy);
        Ok(self)
    }

    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.tracker
    }

    async fn dial(
        tracker: Arc<ConnectionTracker>,
        proxy: Option<Uri>,
        host: &str,
        port: u16,
    ) -> Result<Tracked> {
        let ticket = tracker.begin_dial();
        match proxy {
            None => {
                debug!(host, port, "connecting");
                let tcp = TcpStream::connect((host, port)).await?;
                Ok(tracker.track(ticket, tcp))
            }
            Some(proxy) => {
                let proxy_host = proxy
                    .host()
                    .map(trim_brackets)
                    .ok_or_else(|| anyhow!("proxy url has no host"))?;
                let proxy_port = proxy.port_u16().unwrap_or(80);
                debug!(host, port, proxy_host, proxy_port, "connecting through proxy");
                let tcp = TcpStream::connect((proxy_host, proxy_port)).await?;
                let mut stream = tracker.track(ticket, tcp);
                tunnel(&mut stream, host, port).await?;
                Ok(stream)
            }
        }
    }
}

impl fmt::Debug for TrackingConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingConnector")
            .field("tls_server_name", &self.tls_server_name)
            .field("proxy", &self.proxy)
            .finish()
    }
}

impl Service<Uri> for TrackingConnector {
    type Response = ClusterStream;
    type Error = anyhow::Error;

    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let connector = self.clone();

        Box::pin(async move {
            let host = match uri.host() {
                Some(h) => trim_brackets(h).to_owned(),
                None => return Err(anyhow!("no host")),
            };

            match uri.scheme_str() {
                Some("http") => {
                    let port = uri.port_u16().unwrap_or(80);
                    let stream =
                        Self::dial(connector.tracker, connector.proxy, &host, port).await?;
                    Ok(ClusterStream::Plain(stream))
                }
                Some("https") => {
                    let port = uri.port_u16().unwrap_or(443);
                    let stream =
                        Self::dial(connector.tracker, connector.proxy, &host, port).await?;

                    let sni = connector.tls_server_name.as_deref().unwrap_or(&host);
                    let server_name = ServerName::try_from(sni)
                        .map_err(|err| anyhow!("invalid server name {}: {}", sni, err))?;
                    trace!(sni, "tls handshake");
                    let tls = TlsConnector::from(connector.tls)
                        .connect(server_name, stream)
                        .await?;
                    Ok(ClusterStream::Tls(Box::new(tls)))
                }
                scheme => Err(anyhow!("unsupported scheme: {:?}", scheme)),
            }
        })
    }
}

fn trim_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

async fn tunnel(stream: &mut Tracked, host: &str, port: u16) -> Result<()> {
    let authority = if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    let request = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let mut status = String::new();
    reader.read_line(&mut status).await?;
    let code = status.split_whitespace().nth(1);
    if code != Some("200") {
        return Err(anyhow!("proxy refused CONNECT: {}", status.trim()));
    }
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 || line == "\r\n" || line == "\n" {
            break;
        }
    }
    if !reader.buffer().is_empty() {
        return Err(anyhow!("proxy sent data before tunnel was established"));
    }
    Ok(())
}

use std::fmt;
use std::io::BufReader;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::SystemTime;

use rustls::client::ResolvesClientCert;
use rustls::client::Resumption;
use rustls::client::ServerCertVerified;
use rustls::client::ServerCertVerifier;
use rustls::sign::any_supported_type;
use rustls::sign::CertifiedKey;
use rustls::Certificate;
use rustls::ClientConfig;
use rustls::OwnedTrustAnchor;
use rustls::PrivateKey;
use rustls::RootCertStore;
use rustls::ServerName;
use rustls::SignatureScheme;
use rustls_pemfile::Item;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::AuthError;

/// parsed client certificate chain with its signing key
#[derive(Clone)]
pub struct ClientIdentity {
    chain: Vec<Certificate>,
    key: Arc<CertifiedKey>,
}

impl ClientIdentity {
    /// parse PEM encoded certificate chain and private key
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, AuthError> {
        let chain = load_certs(cert_pem)?;
        if chain.is_empty() {
            return Err(AuthError::malformed("no certificate found in client certificate data"));
        }
        let private_key = load_private_key(key_pem)?;
        let signing_key = any_supported_type(&private_key)
            .map_err(|err| AuthError::malformed(format!("unsupported client key: {err}")))?;
        let key = Arc::new(CertifiedKey::new(chain.clone(), signing_key));
        Ok(Self { chain, key })
    }

    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        self.key.clone()
    }
}

impl fmt::Debug for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIdentity")
            .field("certificates", &self.chain.len())
            .finish()
    }
}

pub fn load_certs(pem: &[u8]) -> Result<Vec<Certificate>, AuthError> {
    let mut reader = BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)?;
    Ok(certs.into_iter().map(Certificate).collect())
}

pub fn load_private_key(pem: &[u8]) -> Result<PrivateKey, AuthError> {
    let mut reader = BufReader::new(pem);
    for item in rustls_pemfile::read_all(&mut reader)? {
        match item {
            Item::RSAKey(key) | Item::PKCS8Key(key) | Item::ECKey(key) => {
                return Ok(PrivateKey(key))
            }
            _ => {}
        }
    }
    Err(AuthError::malformed("no private key found in client key data"))
}

/// Client certificate currently presented by a session. Swapped by the
/// authenticator on refresh and read during TLS handshakes.
#[derive(Default)]
pub struct CertSlot(RwLock<Option<Arc<CertifiedKey>>>);

impl CertSlot {
    pub fn set(&self, key: Option<Arc<CertifiedKey>>) {
        let mut slot = self.0.write().unwrap_or_else(|poison| poison.into_inner());
        *slot = key;
    }

    pub fn get(&self) -> Option<Arc<CertifiedKey>> {
        self.0
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

impl fmt::Debug for CertSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CertSlot(loaded: {})", self.get().is_some())
    }
}

struct SlotCertResolver(Arc<CertSlot>);

impl ResolvesClientCert for SlotCertResolver {
    fn resolve(
        &self,
        _acceptable_issuers: &[&[u8]],
        _sigschemes: &[SignatureScheme],
    ) -> Option<Arc<CertifiedKey>> {
        let key = self.0.get();
        trace!(present = key.is_some(), "client certificate requested");
        key
    }

    fn has_certs(&self) -> bool {
        self.0.get().is_some()
    }
}

/// accepts any server certificate, for `insecure-skip-tls-verify`
struct InsecureVerifier;

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// trust store from PEM CA data, or the bundled web roots when none given
pub fn root_store(ca_data: Option<&[u8]>) -> Result<RootCertStore, AuthError> {
    let mut roots = RootCertStore::empty();
    match ca_data {
        Some(pem) => {
            let certs = load_certs(pem)?;
            if certs.is_empty() {
                return Err(AuthError::configuration("no certificate found in CA data"));
            }
            for cert in &certs {
                roots.add(cert)?;
            }
            debug!(count = certs.len(), "loaded CA certificates");
        }
        None => {
            roots.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
                OwnedTrustAnchor::from_subject_spki_name_constraints(
                    ta.subject,
                    ta.spki,
                    ta.name_constraints,
                )
            }));
        }
    }
    Ok(roots)
}

/// Rustls config whose client certificate follows `cert_slot`.
///
/// Session resumption is off: a resumed session skips client authentication
/// and would keep presenting the certificate of the session it resumes.
pub fn client_tls_config(
    ca_data: Option<&[u8]>,
    insecure: bool,
    cert_slot: Arc<CertSlot>,
) -> Result<ClientConfig, AuthError> {
    let builder = ClientConfig::builder().with_safe_defaults();
    let resolver = Arc::new(SlotCertResolver(cert_slot));
    let mut config = if insecure {
        warn!("server certificate verification disabled");
        builder
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
            .with_client_cert_resolver(resolver)
    } else {
        builder
            .with_root_certificates(root_store(ca_data)?)
            .with_client_cert_resolver(resolver)
    };
    config.resumption = Resumption::disabled();
    Ok(config)
}

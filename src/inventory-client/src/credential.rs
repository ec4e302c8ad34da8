use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use rustls::sign::CertifiedKey;
use rustls::Certificate;

use inventory_types::exec_credential::ExecCredentialStatus;

use crate::tls::ClientIdentity;
use crate::AuthError;

/// credential as produced by a provider, before validation
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub token: Option<String>,
    pub client_certificate_data: Option<String>,
    pub client_key_data: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn token<T: Into<String>>(token: T) -> Self {
        Self {
            token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn client_certificate<C: Into<String>, K: Into<String>>(cert_pem: C, key_pem: K) -> Self {
        Self {
            client_certificate_data: Some(cert_pem.into()),
            client_key_data: Some(key_pem.into()),
            ..Default::default()
        }
    }

    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Check the credential and parse its client identity.
    ///
    /// Empty strings count as absent. A certificate without a key, or a key
    /// without a certificate, is a pairing error.
    pub fn validate(self) -> Result<SessionCredential, AuthError> {
        let token = self.token.filter(|t| !t.is_empty());
        let cert = self.client_certificate_data.filter(|c| !c.is_empty());
        let key = self.client_key_data.filter(|k| !k.is_empty());

        let identity = match (cert, key) {
            (Some(cert), Some(key)) => {
                Some(ClientIdentity::from_pem(cert.as_bytes(), key.as_bytes())?)
            }
            (Some(_), None) => {
                return Err(AuthError::Pairing(
                    "client certificate data found but no client key data".to_owned(),
                ))
            }
            (None, Some(_)) => {
                return Err(AuthError::Pairing(
                    "client key data found but no client certificate data".to_owned(),
                ))
            }
            (None, None) => None,
        };

        if token.is_none() && identity.is_none() {
            return Err(AuthError::malformed(
                "neither token nor client certificate present",
            ));
        }

        Ok(SessionCredential {
            token,
            identity,
            expires_at: self.expires_at,
        })
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("client_certificate", &self.client_certificate_data.is_some())
            .field("client_key", &self.client_key_data.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl From<ExecCredentialStatus> for Credential {
    fn from(status: ExecCredentialStatus) -> Self {
        Self {
            token: status.token,
            client_certificate_data: status.client_certificate_data,
            client_key_data: status.client_key_data,
            expires_at: status.expiration_timestamp,
        }
    }
}

impl From<Credential> for ExecCredentialStatus {
    fn from(credential: Credential) -> Self {
        Self {
            expiration_timestamp: credential.expires_at,
            token: credential.token,
            client_certificate_data: credential.client_certificate_data,
            client_key_data: credential.client_key_data,
        }
    }
}

/// Validated credential cached by an authenticator.
///
/// Never mutated: a refresh installs a new `Arc`, and callers compare
/// `Arc`s by identity to tell whether the credential they used is still current.
pub struct SessionCredential {
    token: Option<String>,
    identity: Option<ClientIdentity>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionCredential {
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// without an expiry the credential is only replaced after a 401
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }

    pub fn client_chain(&self) -> Option<&[Certificate]> {
        self.identity.as_ref().map(ClientIdentity::chain)
    }

    pub fn certified_key(&self) -> Option<Arc<CertifiedKey>> {
        self.identity.as_ref().map(ClientIdentity::certified_key)
    }

    /// true when both present the same client certificate chain (or neither has one)
    pub fn same_client_certificate(&self, other: &SessionCredential) -> bool {
        self.client_chain() == other.client_chain()
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod test {

    use std::fs::read_to_string;

    use chrono::Duration;
    use chrono::Utc;

    use super::Credential;
    use crate::AuthError;

    fn pem(name: &str) -> String {
        read_to_string(format!("{}/data/{name}", env!("CARGO_MANIFEST_DIR"))).expect("pem")
    }

    #[test]
    fn test_token_credential() {
        let now = Utc::now();
        let session = Credential::token("abcdefg")
            .expires_at(now)
            .validate()
            .expect("valid");
        assert_eq!(session.token(), Some("abcdefg"));
        assert!(session.client_chain().is_none());
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::seconds(1)));
    }

    #[test]
    fn test_no_expiry_never_expires() {
        let session = Credential::token("t").validate().expect("valid");
        assert!(!session.is_expired(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn test_empty_credential_is_malformed() {
        let err = Credential::default().validate().expect_err("empty");
        assert!(matches!(err, AuthError::MalformedCredential(_)));

        let err = Credential::token("").validate().expect_err("empty token");
        assert!(matches!(err, AuthError::MalformedCredential(_)));
    }

    #[test]
    fn test_pairing() {
        let cert_only = Credential {
            client_certificate_data: Some(pem("client-a.crt")),
            ..Default::default()
        };
        assert!(matches!(cert_only.validate(), Err(AuthError::Pairing(_))));

        let key_only = Credential {
            token: Some("t".to_owned()),
            client_key_data: Some(pem("client-a.key")),
            ..Default::default()
        };
        assert!(matches!(key_only.validate(), Err(AuthError::Pairing(_))));
    }

    #[test]
    fn test_certificate_comparison() {
        let a = Credential::client_certificate(pem("client-a.crt"), pem("client-a.key"))
            .validate()
            .expect("a");
        let a_again = Credential::client_certificate(pem("client-a.crt"), pem("client-a.key"))
            .validate()
            .expect("a");
        let b = Credential::client_certificate(pem("client-b.crt"), pem("client-b.key"))
            .validate()
            .expect("b");
        let token = Credential::token("t").validate().expect("token");

        assert!(a.same_client_certificate(&a_again));
        assert!(!a.same_client_certificate(&b));
        assert!(!a.same_client_certificate(&token));
        assert!(token.same_client_certificate(&Credential::token("u").validate().expect("u")));
    }
}

use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;
use tracing::info;
use tracing::trace;

use crate::provider::CredentialProvider;
use crate::tls::CertSlot;
use crate::AuthError;
use crate::ClusterDescriptor;
use crate::ConnectionTracker;
use crate::SessionCredential;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// nothing fetched yet, or every fetch so far failed
    Empty,
    Valid,
    /// expired or invalidated, refreshed on next use
    Stale,
}

#[derive(Default)]
struct Slot {
    credential: Option<Arc<SessionCredential>>,
    stale: bool,
}

/// Caches the credential of one provider for one cluster.
///
/// The provider is invoked under the session lock, so concurrent callers of an
/// empty or stale session share a single invocation.
pub struct Authenticator {
    provider: Arc<dyn CredentialProvider>,
    descriptor: ClusterDescriptor,
    slot: Mutex<Slot>,
    cert_slot: Arc<CertSlot>,
    tracker: Arc<ConnectionTracker>,
    clock: Clock,
}

impl Authenticator {
    pub fn new(provider: Arc<dyn CredentialProvider>, descriptor: ClusterDescriptor) -> Self {
        Self {
            provider,
            descriptor,
            slot: Mutex::new(Slot::default()),
            cert_slot: Arc::new(CertSlot::default()),
            tracker: Arc::new(ConnectionTracker::new()),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_tracker(mut self, tracker: Arc<ConnectionTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn descriptor(&self) -> &ClusterDescriptor {
        &self.descriptor
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// client certificate currently presented on new TLS handshakes
    pub fn cert_slot(&self) -> Arc<CertSlot> {
        self.cert_slot.clone()
    }

    pub fn tracker(&self) -> Arc<ConnectionTracker> {
        self.tracker.clone()
    }

    pub async fn state(&self) -> SessionState {
        let slot = self.slot.lock().await;
        match &slot.credential {
            None => SessionState::Empty,
            Some(credential) if slot.stale || credential.is_expired((self.clock)()) => {
                SessionState::Stale
            }
            Some(_) => SessionState::Valid,
        }
    }

    /// Cached credential, refreshed first when missing, invalidated or expired.
    pub async fn get_credential(&self) -> Result<Arc<SessionCredential>, AuthError> {
        let mut slot = self.slot.lock().await;
        if let Some(credential) = &slot.credential {
            if !slot.stale && !credential.is_expired((self.clock)()) {
                trace!("using cached credential");
                return Ok(credential.clone());
            }
        }
        self.refresh_locked(&mut slot).await
    }

    /// Refresh only when `prior` is still the cached credential.
    ///
    /// Callers that observed a 401 with an older credential get `Ok` without
    /// another provider invocation. A failed refresh leaves the session stale.
    pub async fn invalidate(&self, prior: &Arc<SessionCredential>) -> Result<(), AuthError> {
        let mut slot = self.slot.lock().await;
        match &slot.credential {
            Some(current) if Arc::ptr_eq(current, prior) => {}
            _ => {
                trace!("credential already replaced, skipping refresh");
                return Ok(());
            }
        }

        debug!(provider = %self.provider.name(), "credential rejected, refreshing");
        slot.stale = true;
        self.refresh_locked(&mut slot).await.map(|_| ())
    }

    async fn refresh_locked(&self, slot: &mut Slot) -> Result<Arc<SessionCredential>, AuthError> {
        debug!(provider = %self.provider.name(), server = %self.descriptor.server, "fetching credential");
        let credential = self.provider.credential(&self.descriptor).await?;
        let fresh = Arc::new(credential.validate()?);

        let rotated = match &slot.credential {
            Some(old) => !old.same_client_certificate(&fresh),
            None => false,
        };

        self.cert_slot.set(fresh.certified_key());
        slot.credential = Some(fresh.clone());
        slot.stale = false;

        if rotated {
            let closed = self.tracker.close_all();
            info!(closed, "client certificate rotated, closed connections");
        }
        Ok(fresh)
    }
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("provider", &self.provider.name())
            .field("server", &self.descriptor.server)
            .finish()
    }
}

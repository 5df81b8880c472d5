//! One explicit session per logged-in account.
//!
//! Owns the device identity, the custodian and (once the account key is
//! resolved) the note synchronizer. Created after authentication, dropped
//! on logout; the stores are injected rather than reached through ambient
//! state.

use std::sync::Arc;

use lockleaf_crypto::DeviceKeypair;

use crate::custodian::{Custodian, KeyStatus};
use crate::error::CoreError;
use crate::model::SessionInfo;
use crate::registrar::Registrar;
use crate::store::{KeyVault, LocalCache, RemoteStore};
use crate::sync::NoteSynchronizer;

pub struct Session {
    info: SessionInfo,
    device: Arc<DeviceKeypair>,
    custodian: Custodian,
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    notes: Option<NoteSynchronizer>,
}

impl Session {
    /// Enroll this installation (idempotently), resolve the account key
    /// and build the note synchronizer when a key is available.
    ///
    /// A pending device gets a session without note access; the caller
    /// should render a setup-incomplete state and call
    /// [`Session::resolve_key`] again after another device approves it.
    pub async fn establish(
        info: SessionInfo,
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        vault: Arc<dyn KeyVault>,
    ) -> Result<Self, CoreError> {
        let registrar = Registrar::new(Arc::clone(&remote), Arc::clone(&vault));
        let device = Arc::new(registrar.ensure_registered(&info).await?);
        let custodian = Custodian::new(Arc::clone(&remote), vault, Arc::clone(&device));
        let mut session = Self {
            info,
            device,
            custodian,
            remote,
            cache,
            notes: None,
        };
        session.resolve_key().await?;
        Ok(session)
    }

    /// Re-run key resolution. Turns a pending session into a full one once
    /// an enrolled device has approved us; returns whether note access is
    /// now available.
    pub async fn resolve_key(&mut self) -> Result<bool, CoreError> {
        if self.notes.is_some() {
            return Ok(true);
        }
        match self.custodian.bootstrap_or_fetch_account_key().await? {
            KeyStatus::Ready(key) => {
                self.notes = Some(NoteSynchronizer::new(
                    Arc::clone(&self.remote),
                    Arc::clone(&self.cache),
                    key,
                    self.info.account_id.clone(),
                ));
                Ok(true)
            }
            KeyStatus::Pending => Ok(false),
        }
    }

    pub fn fingerprint(&self) -> String {
        self.device.fingerprint()
    }

    /// False while this device awaits approval.
    pub fn is_setup_complete(&self) -> bool {
        self.notes.is_some()
    }

    pub fn notes(&self) -> Option<&NoteSynchronizer> {
        self.notes.as_ref()
    }

    pub fn custodian(&self) -> &Custodian {
        &self.custodian
    }

    /// Flush any coalesced edit still waiting on its quiet period, then
    /// drop the session.
    pub async fn logout(self) {
        if let Some(notes) = &self.notes {
            notes.flush().await;
        }
    }
}

//! Device enrollment.
//!
//! On first run the installation generates its x25519 keypair, persists it
//! in the key vault and submits a device record to the remote store. Later
//! runs find the stored keypair and perform no remote write, so enrollment
//! is idempotent and the fingerprint is stable for the lifetime of the
//! installation.

use std::sync::Arc;

use tracing::{debug, info};

use lockleaf_crypto::DeviceKeypair;

use crate::error::CoreError;
use crate::model::{DeviceRecord, SessionInfo};
use crate::retry::with_backoff;
use crate::store::{KeyVault, RemoteStore, PRIVATE_KEY_SLOT, PUBLIC_KEY_SLOT};

pub struct Registrar {
    remote: Arc<dyn RemoteStore>,
    vault: Arc<dyn KeyVault>,
}

impl Registrar {
    pub fn new(remote: Arc<dyn RemoteStore>, vault: Arc<dyn KeyVault>) -> Self {
        Self { remote, vault }
    }

    fn stored_identity(&self) -> Result<Option<DeviceKeypair>, CoreError> {
        match self.vault.get(PRIVATE_KEY_SLOT)? {
            Some(secret) => {
                let keypair = DeviceKeypair::from_bytes(&secret).map_err(|e| {
                    CoreError::RegistrationFailed(format!("stored keypair invalid: {e}"))
                })?;
                Ok(Some(keypair))
            }
            None => Ok(None),
        }
    }

    /// Enroll this installation, generating an identity only when the vault
    /// holds none. The keypair is persisted after the remote write
    /// succeeds, so a failed registration retries from scratch.
    pub async fn ensure_registered(
        &self,
        session: &SessionInfo,
    ) -> Result<DeviceKeypair, CoreError> {
        if let Some(existing) = self.stored_identity()? {
            debug!(fingerprint = %existing.fingerprint(), "device already enrolled");
            return Ok(existing);
        }

        let keypair = DeviceKeypair::generate();
        let record = DeviceRecord {
            fingerprint: keypair.fingerprint(),
            public_key: keypair.public().to_b64(),
            display_name: session.display_name(),
            wrapped_account_key: None,
        };
        with_backoff("register device", || self.remote.create_device(&record))
            .await
            .map_err(|e| CoreError::RegistrationFailed(e.to_string()))?;

        self.vault.set(PRIVATE_KEY_SLOT, keypair.secret_bytes())?;
        self.vault.set(PUBLIC_KEY_SLOT, keypair.public().as_bytes())?;
        info!(fingerprint = %keypair.fingerprint(), "device enrolled");
        Ok(keypair)
    }
}

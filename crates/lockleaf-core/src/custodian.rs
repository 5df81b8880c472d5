//! Account key custodian.
//!
//! Resolves the single symmetric account key for this device and drives
//! multi-device approval. Resolution order: vault fast path, first-device
//! bootstrap, unwrap of the blob an approving device attached to our
//! record, or pending.
//!
//! Approval and denial are last-writer-wins, non-transactional updates;
//! callers may retry them safely.

use std::sync::Arc;

use tracing::{debug, info};

use lockleaf_crypto::keywrap::{self, AccountKey};
use lockleaf_crypto::{DeviceKeypair, DevicePublicKey};

use crate::error::CoreError;
use crate::model::DeviceRecord;
use crate::retry::with_backoff;
use crate::store::{DeviceFilter, KeyVault, RemoteStore, ACCOUNT_KEY_SLOT};

/// Outcome of key resolution. A pending device must not attempt any
/// decryption until an enrolled device approves it.
#[derive(Debug)]
pub enum KeyStatus {
    Ready(AccountKey),
    Pending,
}

impl KeyStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, KeyStatus::Ready(_))
    }
}

pub struct Custodian {
    remote: Arc<dyn RemoteStore>,
    vault: Arc<dyn KeyVault>,
    device: Arc<DeviceKeypair>,
}

impl Custodian {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        vault: Arc<dyn KeyVault>,
        device: Arc<DeviceKeypair>,
    ) -> Self {
        Self {
            remote,
            vault,
            device,
        }
    }

    /// Resolve the account key for this device.
    ///
    /// The first registrant of an account (its own record is the only one)
    /// mints the key, wraps it under its own public key and stores the
    /// plaintext in the vault. Any later device either unwraps the blob on
    /// its record or stays [`KeyStatus::Pending`].
    ///
    /// Expects this device's record to exist already; run
    /// [`crate::registrar::Registrar::ensure_registered`] first. With no
    /// record present nothing is minted and the device stays pending.
    pub async fn bootstrap_or_fetch_account_key(&self) -> Result<KeyStatus, CoreError> {
        if let Some(bytes) = self.vault.get(ACCOUNT_KEY_SLOT)? {
            let key = AccountKey::from_bytes(&bytes)?;
            return Ok(KeyStatus::Ready(key));
        }

        let devices = with_backoff("list devices", || {
            self.remote.list_devices(DeviceFilter::All)
        })
        .await?;

        let own_fingerprint = self.device.fingerprint();
        let first_registrant = !devices.is_empty()
            && devices
                .iter()
                .all(|d| d.fingerprint == own_fingerprint && d.is_pending());
        if first_registrant {
            let key = AccountKey::generate();
            let wrapped = keywrap::wrap_account_key(&key, self.device.public())?;
            with_backoff("attach wrapped key", || {
                self.remote
                    .set_wrapped_account_key(&own_fingerprint, &wrapped)
            })
            .await?;
            self.vault.set(ACCOUNT_KEY_SLOT, key.as_bytes())?;
            info!("account key minted by first device");
            return Ok(KeyStatus::Ready(key));
        }

        match devices
            .into_iter()
            .find(|d| d.fingerprint == own_fingerprint)
        {
            Some(record) => match record.wrapped_account_key {
                Some(wrapped) => {
                    let key = keywrap::unwrap_account_key(&wrapped, &self.device)
                        .map_err(CoreError::KeyUnwrapFailed)?;
                    self.vault.set(ACCOUNT_KEY_SLOT, key.as_bytes())?;
                    debug!("account key unwrapped from device record");
                    Ok(KeyStatus::Ready(key))
                }
                None => Ok(KeyStatus::Pending),
            },
            None => Ok(KeyStatus::Pending),
        }
    }

    /// Devices of this account awaiting approval, excluding our own record.
    pub async fn list_pending_devices(&self) -> Result<Vec<DeviceRecord>, CoreError> {
        let own_fingerprint = self.device.fingerprint();
        let pending = self
            .remote
            .list_devices(DeviceFilter::MissingWrappedKey)
            .await?;
        Ok(pending
            .into_iter()
            .filter(|d| d.fingerprint != own_fingerprint)
            .collect())
    }

    /// Wrap the locally held account key for `device` and attach it to the
    /// device's remote record, admitting it to the account.
    pub async fn approve_device(&self, device: &DeviceRecord) -> Result<(), CoreError> {
        let bytes = self
            .vault
            .get(ACCOUNT_KEY_SLOT)?
            .ok_or_else(|| CoreError::NotFound("account key not held locally".into()))?;
        let key = AccountKey::from_bytes(&bytes)?;
        let public = DevicePublicKey::from_b64(&device.public_key)?;
        let wrapped = keywrap::wrap_account_key(&key, &public)?;
        with_backoff("approve device", || {
            self.remote
                .set_wrapped_account_key(&device.fingerprint, &wrapped)
        })
        .await?;
        info!(fingerprint = %device.fingerprint, "device approved");
        Ok(())
    }

    /// Delete the device's record, refusing it access to the account.
    pub async fn deny_device(&self, device: &DeviceRecord) -> Result<(), CoreError> {
        with_backoff("deny device", || {
            self.remote.delete_device(&device.fingerprint)
        })
        .await?;
        info!(fingerprint = %device.fingerprint, "device denied");
        Ok(())
    }
}

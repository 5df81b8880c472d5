//! OS-keyring key vault.
//!
//! Secrets are stored through the platform credential manager under the
//! `Lockleaf` service, one entry per slot and account
//! (`<slot>:<account_id>`), values base64-encoded.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use keyring::Entry;

use crate::error::CoreError;
use crate::store::KeyVault;

const SERVICE_NAME: &str = "Lockleaf";

pub struct KeyringVault {
    account_id: String,
}

impl KeyringVault {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
        }
    }

    fn entry(&self, slot: &str) -> Result<Entry, CoreError> {
        Entry::new(SERVICE_NAME, &format!("{}:{}", slot, self.account_id))
            .map_err(|e| CoreError::LocalPersistenceFailed(format!("keyring init: {e}")))
    }
}

impl KeyVault for KeyringVault {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, CoreError> {
        match self.entry(slot)?.get_password() {
            Ok(encoded) => {
                let decoded = STANDARD.decode(encoded).map_err(|e| {
                    CoreError::LocalPersistenceFailed(format!("decode {slot}: {e}"))
                })?;
                Ok(Some(decoded))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CoreError::LocalPersistenceFailed(format!(
                "load {slot}: {e}"
            ))),
        }
    }

    fn set(&self, slot: &str, value: &[u8]) -> Result<(), CoreError> {
        self.entry(slot)?
            .set_password(&STANDARD.encode(value))
            .map_err(|e| CoreError::LocalPersistenceFailed(format!("store {slot}: {e}")))
    }

    fn delete(&self, slot: &str) -> Result<(), CoreError> {
        match self.entry(slot)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CoreError::LocalPersistenceFailed(format!(
                "delete {slot}: {e}"
            ))),
        }
    }
}

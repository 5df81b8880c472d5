//! In-memory store implementations with failure injection, used by the
//! integration tests and by embedders that bring no backend of their own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CoreError;
use crate::model::{DeviceRecord, EncryptedNote, NoteId};
use crate::store::{DeviceFilter, KeyVault, LocalCache, RemoteStore};

/// Remote document store held in process memory. `set_offline(true)` makes
/// every call fail with `RemoteUnavailable`, simulating an outage.
#[derive(Default)]
pub struct MemoryRemote {
    notes: Mutex<HashMap<NoteId, EncryptedNote>>,
    devices: Mutex<HashMap<String, DeviceRecord>>,
    offline: AtomicBool,
    note_writes: AtomicU64,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful note writes (`put_note`), for coalescing
    /// assertions.
    pub fn note_writes(&self) -> u64 {
        self.note_writes.load(Ordering::SeqCst)
    }

    /// Raw stored document, bypassing the trait. Test hook.
    pub fn raw_note(&self, id: &str) -> Option<EncryptedNote> {
        self.notes.lock().get(id).cloned()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    fn check_online(&self) -> Result<(), CoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(CoreError::RemoteUnavailable("simulated outage".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn list_notes(&self) -> Result<Vec<EncryptedNote>, CoreError> {
        self.check_online()?;
        Ok(self.notes.lock().values().cloned().collect())
    }

    async fn put_note(&self, note: &EncryptedNote) -> Result<(), CoreError> {
        self.check_online()?;
        self.notes.lock().insert(note.id.clone(), note.clone());
        self.note_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn archive_note(&self, id: &NoteId) -> Result<(), CoreError> {
        self.check_online()?;
        if let Some(note) = self.notes.lock().get_mut(id) {
            note.archived = true;
        }
        Ok(())
    }

    async fn list_devices(&self, filter: DeviceFilter) -> Result<Vec<DeviceRecord>, CoreError> {
        self.check_online()?;
        let devices = self.devices.lock();
        Ok(devices
            .values()
            .filter(|d| match &filter {
                DeviceFilter::All => true,
                DeviceFilter::MissingWrappedKey => d.is_pending(),
                DeviceFilter::Fingerprint(fp) => &d.fingerprint == fp,
            })
            .cloned()
            .collect())
    }

    async fn create_device(&self, record: &DeviceRecord) -> Result<(), CoreError> {
        self.check_online()?;
        self.devices
            .lock()
            .insert(record.fingerprint.clone(), record.clone());
        Ok(())
    }

    async fn set_wrapped_account_key(
        &self,
        fingerprint: &str,
        wrapped: &str,
    ) -> Result<(), CoreError> {
        self.check_online()?;
        let mut devices = self.devices.lock();
        let record = devices
            .get_mut(fingerprint)
            .ok_or_else(|| CoreError::NotFound(fingerprint.to_string()))?;
        record.wrapped_account_key = Some(wrapped.to_string());
        Ok(())
    }

    async fn delete_device(&self, fingerprint: &str) -> Result<(), CoreError> {
        self.check_online()?;
        self.devices.lock().remove(fingerprint);
        Ok(())
    }
}

/// Local cache held in process memory.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<(NoteId, EncryptedNote)>>>,
    fail_writes: AtomicBool,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn load(
        &self,
        account_id: &str,
    ) -> Result<Option<Vec<(NoteId, EncryptedNote)>>, CoreError> {
        Ok(self.entries.lock().get(account_id).cloned())
    }

    async fn store(
        &self,
        account_id: &str,
        entries: &[(NoteId, EncryptedNote)],
    ) -> Result<(), CoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::LocalPersistenceFailed(
                "simulated write failure".into(),
            ));
        }
        self.entries
            .lock()
            .insert(account_id.to_string(), entries.to_vec());
        Ok(())
    }
}

/// Key vault held in process memory. One instance per simulated
/// installation.
#[derive(Default)]
pub struct MemoryVault {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyVault for MemoryVault {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.slots.lock().get(slot).cloned())
    }

    fn set(&self, slot: &str, value: &[u8]) -> Result<(), CoreError> {
        self.slots.lock().insert(slot.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, slot: &str) -> Result<(), CoreError> {
        self.slots.lock().remove(slot);
        Ok(())
    }
}

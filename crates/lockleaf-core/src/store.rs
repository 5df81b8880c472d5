//! Storage and transport seams.
//!
//! The cloud document store, the per-account local cache and the
//! installation key vault are external collaborators; the core only talks
//! to these traits. Shipped implementations: [`crate::vault_keyring`],
//! [`crate::cache_file`] and the in-memory set in [`crate::memory`].

use async_trait::async_trait;

use crate::error::CoreError;
use crate::model::{DeviceRecord, EncryptedNote, NoteId};

/// Fixed key-vault slot names, shared by every vault implementation.
pub const PUBLIC_KEY_SLOT: &str = "publicKey";
pub const PRIVATE_KEY_SLOT: &str = "privateKey";
pub const ACCOUNT_KEY_SLOT: &str = "accountKey";

/// Device-collection filter predicates the remote store must support
/// (field-is-null and field-equals).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFilter {
    All,
    /// `wrapped_account_key` is null: the pending set.
    MissingWrappedKey,
    Fingerprint(String),
}

/// Cloud document store, scoped to the owning account identity. Documents
/// are owner-readable/writable only; the store never sees plaintext.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_notes(&self) -> Result<Vec<EncryptedNote>, CoreError>;
    /// Create or overwrite the note document with this id.
    async fn put_note(&self, note: &EncryptedNote) -> Result<(), CoreError>;
    /// Soft delete: set `archived = true` on the remote document.
    async fn archive_note(&self, id: &NoteId) -> Result<(), CoreError>;

    async fn list_devices(&self, filter: DeviceFilter) -> Result<Vec<DeviceRecord>, CoreError>;
    async fn create_device(&self, record: &DeviceRecord) -> Result<(), CoreError>;
    async fn set_wrapped_account_key(
        &self,
        fingerprint: &str,
        wrapped: &str,
    ) -> Result<(), CoreError>;
    async fn delete_device(&self, fingerprint: &str) -> Result<(), CoreError>;
}

/// Durable key-value persistence for the serialized encrypted note set,
/// keyed by account identity. Entries keep their order across a
/// store/load round trip.
#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn load(
        &self,
        account_id: &str,
    ) -> Result<Option<Vec<(NoteId, EncryptedNote)>>, CoreError>;
    async fn store(
        &self,
        account_id: &str,
        entries: &[(NoteId, EncryptedNote)],
    ) -> Result<(), CoreError>;
}

/// Secure at-rest storage scoped to this installation, holding the device
/// keypair and the plaintext account key under the fixed slot names.
pub trait KeyVault: Send + Sync {
    fn get(&self, slot: &str) -> Result<Option<Vec<u8>>, CoreError>;
    fn set(&self, slot: &str, value: &[u8]) -> Result<(), CoreError>;
    fn delete(&self, slot: &str) -> Result<(), CoreError>;
}

//! Lockleaf core: device enrollment, account-key custody and the encrypted
//! note synchronizer.
//!
//! The cloud document store, the local cache and the key vault are injected
//! behind the [`store`] traits; the remote side only ever sees
//! [`model::EncryptedNote`] payloads and public key material. One
//! [`Session`] is created per logged-in account and owns the device
//! identity, the resolved account key and the note working set.

pub mod cache_file;
pub mod custodian;
pub mod error;
pub mod memory;
pub mod model;
pub mod registrar;
pub mod retry;
pub mod session;
pub mod store;
pub mod sync;
pub mod vault_keyring;

pub use custodian::{Custodian, KeyStatus};
pub use error::CoreError;
pub use registrar::Registrar;
pub use session::Session;
pub use sync::NoteSynchronizer;

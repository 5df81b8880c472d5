//! Lockleaf cryptographic primitives.
//!
//! Three concerns, all offline and runtime-free:
//!
//! - [`cipher`] — symmetric encryption of note fields under the account key
//!   (XChaCha20-Poly1305, random nonce prepended per field).
//! - [`identity`] — the per-installation x25519 device keypair and its
//!   SHA-256 fingerprint.
//! - [`keywrap`] — the 32-byte account key and its sealed-box wrapping
//!   under a device public key, used for multi-device approval.

pub mod cipher;
pub mod error;
pub mod identity;
pub mod keywrap;

pub use error::CryptoError;
pub use identity::{DeviceKeypair, DevicePublicKey};
pub use keywrap::AccountKey;

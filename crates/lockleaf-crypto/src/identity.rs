//! Device identity.
//!
//! Each installation owns one long-term x25519 keypair, created lazily on
//! first run and never rotated. The public half is registered in the
//! remote device collection; the secret half lives only in the key vault.
//!
//! The fingerprint (hex SHA-256 of the public key bytes) is the device's
//! canonical identity: it is the only identifier reconstructible without
//! server-assigned state, so every device lookup keys on it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::ZeroizeOnDrop;

use crate::error::CryptoError;

pub const KEY_LEN: usize = 32;

/// 32-byte x25519 public key, base64-encoded on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicePublicKey([u8; KEY_LEN]);

impl DevicePublicKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn to_b64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_b64(s: &str) -> Result<Self, CryptoError> {
        let bytes = STANDARD.decode(s)?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKey(format!("public key must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Hex SHA-256 of the raw public key bytes. Deterministic, so two
    /// computations over the same key always agree.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.0))
    }
}

/// Per-installation keypair. The secret half is zeroized on drop and never
/// leaves the key vault.
#[derive(ZeroizeOnDrop)]
pub struct DeviceKeypair {
    #[zeroize(skip)]
    public: DevicePublicKey,
    secret_bytes: [u8; KEY_LEN],
}

impl DeviceKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self {
            public: DevicePublicKey(public.to_bytes()),
            secret_bytes: secret.to_bytes(),
        }
    }

    /// Rebuild the keypair from the secret bytes held in the key vault.
    pub fn from_bytes(secret: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_LEN] = secret.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("secret key must be 32 bytes, got {}", secret.len()))
        })?;
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Ok(Self {
            public: DevicePublicKey(public.to_bytes()),
            secret_bytes: secret.to_bytes(),
        })
    }

    pub fn public(&self) -> &DevicePublicKey {
        &self.public
    }

    pub fn fingerprint(&self) -> String {
        self.public.fingerprint()
    }

    pub fn secret_bytes(&self) -> &[u8; KEY_LEN] {
        &self.secret_bytes
    }

    pub(crate) fn static_secret(&self) -> StaticSecret {
        StaticSecret::from(self.secret_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let keypair = DeviceKeypair::generate();
        assert_eq!(keypair.fingerprint(), keypair.fingerprint());
        assert_eq!(keypair.fingerprint().len(), 64);
    }

    #[test]
    fn secret_bytes_round_trip() {
        let keypair = DeviceKeypair::generate();
        let restored = DeviceKeypair::from_bytes(keypair.secret_bytes()).unwrap();
        assert_eq!(restored.public(), keypair.public());
        assert_eq!(restored.fingerprint(), keypair.fingerprint());
    }

    #[test]
    fn public_key_b64_round_trip() {
        let keypair = DeviceKeypair::generate();
        let b64 = keypair.public().to_b64();
        assert_eq!(&DevicePublicKey::from_b64(&b64).unwrap(), keypair.public());
    }

    #[test]
    fn wrong_length_key_rejected() {
        assert!(DeviceKeypair::from_bytes(&[0u8; 31]).is_err());
        let short = STANDARD.encode([0u8; 16]);
        assert!(DevicePublicKey::from_b64(&short).is_err());
    }
}

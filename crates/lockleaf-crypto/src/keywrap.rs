//! Account key generation and public-key wrapping.
//!
//! One 32-byte account key exists per account, minted by the first device
//! to enroll. Approval of another device wraps that key under the
//! device's x25519 public key, sealed-box style:
//!
//!   1. generate an ephemeral x25519 keypair
//!   2. DH(ephemeral secret, device public) -> shared secret
//!   3. HKDF-SHA256(shared, info = "lockleaf-key-wrap-v1" || both publics)
//!      -> 32-byte wrap key
//!   4. XChaCha20-Poly1305 seal of the account key under the wrap key
//!
//! Blob format (before base64):
//!   `[ ephemeral public (32) | nonce (24) | ciphertext + tag ]`
//!
//! Only the holder of the device secret key can recompute the shared
//! secret and unwrap.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng as AeadOsRng},
    XChaCha20Poly1305,
};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::cipher::NONCE_LEN;
use crate::error::CryptoError;
use crate::identity::{DeviceKeypair, DevicePublicKey, KEY_LEN};

pub const ACCOUNT_KEY_LEN: usize = 32;
const WRAP_INFO: &[u8] = b"lockleaf-key-wrap-v1";

/// The single symmetric secret shared by an account's approved devices.
/// Zeroized on drop; compared in constant time.
#[derive(Clone, ZeroizeOnDrop)]
pub struct AccountKey([u8; ACCOUNT_KEY_LEN]);

impl AccountKey {
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; ACCOUNT_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ACCOUNT_KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "account key must be {ACCOUNT_KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_KEY_LEN] {
        &self.0
    }
}

// Never print the key bytes.
impl fmt::Debug for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountKey(..)")
    }
}

impl PartialEq for AccountKey {
    fn eq(&self, other: &Self) -> bool {
        let mut diff = 0u8;
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

impl Eq for AccountKey {}

fn derive_wrap_key(
    shared: &[u8],
    ephemeral_pub: &[u8; KEY_LEN],
    recipient_pub: &[u8; KEY_LEN],
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, shared);
    let mut info = Vec::with_capacity(WRAP_INFO.len() + KEY_LEN * 2);
    info.extend_from_slice(WRAP_INFO);
    info.extend_from_slice(ephemeral_pub);
    info.extend_from_slice(recipient_pub);
    let mut out = Zeroizing::new([0u8; 32]);
    hk.expand(&info, out.as_mut())
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    Ok(out)
}

/// Wrap the account key for the device owning `recipient`. Safe to store
/// or transmit; yields a different blob every call.
pub fn wrap_account_key(
    key: &AccountKey,
    recipient: &DevicePublicKey,
) -> Result<String, CryptoError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient.as_bytes()));

    let wrap_key = derive_wrap_key(
        shared.as_bytes(),
        &ephemeral_pub.to_bytes(),
        recipient.as_bytes(),
    )?;
    let cipher = XChaCha20Poly1305::new_from_slice(wrap_key.as_ref())
        .map_err(|e| CryptoError::WrapFailed(e.to_string()))?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut AeadOsRng);
    let sealed = cipher
        .encrypt(&nonce, key.as_bytes().as_slice())
        .map_err(|_| CryptoError::WrapFailed("seal failed".into()))?;

    let mut out = Vec::with_capacity(KEY_LEN + NONCE_LEN + sealed.len());
    out.extend_from_slice(&ephemeral_pub.to_bytes());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(STANDARD.encode(out))
}

/// Unwrap a blob produced by [`wrap_account_key`] with the local device
/// secret. Any parse or authentication failure maps to `UnwrapFailed`.
pub fn unwrap_account_key(
    blob: &str,
    keypair: &DeviceKeypair,
) -> Result<AccountKey, CryptoError> {
    let data = STANDARD.decode(blob).map_err(|_| CryptoError::UnwrapFailed)?;
    if data.len() < KEY_LEN + NONCE_LEN {
        return Err(CryptoError::UnwrapFailed);
    }
    let (ephemeral_pub, rest) = data.split_at(KEY_LEN);
    let (nonce_bytes, sealed) = rest.split_at(NONCE_LEN);
    let ephemeral_pub: [u8; KEY_LEN] = ephemeral_pub
        .try_into()
        .map_err(|_| CryptoError::UnwrapFailed)?;

    let shared = keypair
        .static_secret()
        .diffie_hellman(&PublicKey::from(ephemeral_pub));
    let wrap_key = derive_wrap_key(
        shared.as_bytes(),
        &ephemeral_pub,
        keypair.public().as_bytes(),
    )?;

    let cipher = XChaCha20Poly1305::new_from_slice(wrap_key.as_ref())
        .map_err(|_| CryptoError::UnwrapFailed)?;
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);
    let plaintext = cipher
        .decrypt(nonce, sealed)
        .map_err(|_| CryptoError::UnwrapFailed)?;
    if plaintext.len() != ACCOUNT_KEY_LEN {
        return Err(CryptoError::UnwrapFailed);
    }
    AccountKey::from_bytes(&plaintext)
}

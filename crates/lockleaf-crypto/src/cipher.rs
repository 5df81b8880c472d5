//! Content field encryption.
//!
//! XChaCha20-Poly1305 with a fresh random 24-byte nonce per invocation.
//! The nonce is generated internally and prepended to the ciphertext; no
//! API path accepts a caller-supplied nonce, so nonce reuse under one key
//! cannot happen by misuse.
//!
//! Blob format (before base64): `[ nonce (24 bytes) | ciphertext + tag ]`
//!
//! Title and content of a note are encrypted as two independent fields,
//! each carrying its own nonce, so notes sharing a title do not produce
//! correlated ciphertexts.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305,
};

use crate::error::CryptoError;
use crate::keywrap::AccountKey;

pub const NONCE_LEN: usize = 24;

/// Encrypt one text field under the account key.
pub fn encrypt_field(plaintext: &str, key: &AccountKey) -> Result<String, CryptoError> {
    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::EncryptFailed)?;
    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(out))
}

/// Decrypt a blob produced by [`encrypt_field`]. Tampered or wrong-key
/// input fails the authentication tag and returns `DecryptFailed` instead
/// of garbage.
pub fn decrypt_field(blob: &str, key: &AccountKey) -> Result<String, CryptoError> {
    let data = STANDARD.decode(blob)?;
    if data.len() < NONCE_LEN {
        return Err(CryptoError::DecryptFailed);
    }
    let (nonce_bytes, ct) = data.split_at(NONCE_LEN);
    let nonce = chacha20poly1305::XNonce::from_slice(nonce_bytes);

    let cipher =
        XChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::DecryptFailed)?;
    let plaintext = cipher
        .decrypt(nonce, ct)
        .map_err(|_| CryptoError::DecryptFailed)?;
    String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = AccountKey::generate();
        let blob = encrypt_field("milk, eggs, bread", &key).unwrap();
        assert_eq!(decrypt_field(&blob, &key).unwrap(), "milk, eggs, bread");
    }

    #[test]
    fn empty_string_round_trips() {
        let key = AccountKey::generate();
        let blob = encrypt_field("", &key).unwrap();
        assert_eq!(decrypt_field(&blob, &key).unwrap(), "");
    }

    #[test]
    fn fresh_nonce_per_invocation() {
        let key = AccountKey::generate();
        let a = encrypt_field("same plaintext", &key).unwrap();
        let b = encrypt_field("same plaintext", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_rejected() {
        let blob = encrypt_field("secret", &AccountKey::generate()).unwrap();
        let err = decrypt_field(&blob, &AccountKey::generate()).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptFailed));
    }

    #[test]
    fn tampered_blob_rejected() {
        let key = AccountKey::generate();
        let blob = encrypt_field("secret", &key).unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = STANDARD.encode(raw);
        assert!(decrypt_field(&tampered, &key).is_err());
    }

    #[test]
    fn truncated_blob_rejected() {
        let key = AccountKey::generate();
        let short = STANDARD.encode([0u8; 10]);
        assert!(matches!(
            decrypt_field(&short, &key).unwrap_err(),
            CryptoError::DecryptFailed
        ));
    }
}

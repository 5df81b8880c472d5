use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("field encryption failed")]
    EncryptFailed,

    #[error("field decryption failed: ciphertext rejected")]
    DecryptFailed,

    #[error("key wrap failed: {0}")]
    WrapFailed(String),

    #[error("wrapped key rejected: corrupt blob or mismatched device key")]
    UnwrapFailed,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

use lockleaf_crypto::CryptoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("device registration failed: {0}")]
    RegistrationFailed(String),

    #[error("account key unwrap failed: {0}")]
    KeyUnwrapFailed(CryptoError),

    #[error("field decryption failed: {0}")]
    DecryptFailed(CryptoError),

    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("local persistence failed: {0}")]
    LocalPersistenceFailed(String),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

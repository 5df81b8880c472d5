use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable note identifier (uuid v4, string form on the wire).
pub type NoteId = String;

/// Plaintext view of a note. Held only in memory; never written to the
/// remote store or the local cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

impl Note {
    pub fn untitled() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: "Untitled Note".to_string(),
            content: String::new(),
            created_at: Utc::now(),
            archived: false,
        }
    }
}

/// Wire/cache view: same shape with title and content replaced by field
/// blobs (base64 of nonce-prefixed ciphertext). The only form ever handed
/// to a [`crate::store::RemoteStore`] or [`crate::store::LocalCache`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedNote {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub archived: bool,
}

/// Remote record describing one enrolled device. `wrapped_account_key` is
/// present once the device has been approved, absent while pending.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub fingerprint: String,
    /// Base64 x25519 public key.
    pub public_key: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrapped_account_key: Option<String>,
}

impl DeviceRecord {
    pub fn is_pending(&self) -> bool {
        self.wrapped_account_key.is_none()
    }
}

/// Metadata from the identity/session provider: the authenticated account
/// plus the device strings used to label new device records.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub account_id: String,
    pub device_brand: String,
    pub device_model: String,
    pub os_name: String,
}

impl SessionInfo {
    pub fn display_name(&self) -> String {
        format!("{} {} {}", self.device_brand, self.device_model, self.os_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untitled_note_defaults() {
        let note = Note::untitled();
        assert_eq!(note.title, "Untitled Note");
        assert!(note.content.is_empty());
        assert!(!note.archived);
    }

    #[test]
    fn pending_wire_record_omits_wrapped_key() {
        let record = DeviceRecord {
            fingerprint: "ab".into(),
            public_key: "cd".into(),
            display_name: "Apple iPhone 15 iOS".into(),
            wrapped_account_key: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("wrappedAccountKey"));
        let back: DeviceRecord = serde_json::from_str(&json).unwrap();
        assert!(back.is_pending());
    }
}

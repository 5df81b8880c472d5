//! Note reconciliation and write-through sync.
//!
//! The remote store is authoritative, the local cache keeps the account
//! usable offline. `read_all` reconciles the two: local-only notes are
//! pushed back to the remote (repairing a prior partitioned write),
//! remote tombstones evict local copies, and every other remote copy
//! overwrites the local one unconditionally. No field-level merge and no
//! logical clocks; concurrent edits from two devices resolve
//! last-write-wins by design.
//!
//! Remote failures inside any operation are logged and counted, never
//! surfaced as blocking errors; the local cache is still updated, so the
//! working set can diverge from the remote under a sustained outage. The
//! divergence is observable through [`NoteSynchronizer::pending_writes`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use lockleaf_crypto::cipher;
use lockleaf_crypto::AccountKey;

use crate::error::CoreError;
use crate::model::{EncryptedNote, Note, NoteId};
use crate::retry::with_backoff;
use crate::store::{LocalCache, RemoteStore};

/// Shown in place of a field whose ciphertext failed authentication, so
/// one corrupt field never aborts the whole read.
pub const UNREADABLE_FIELD: &str = "(unreadable)";

/// Quiet period before a coalesced edit is written through.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(400);

#[derive(Default)]
struct SyncState {
    notes: HashMap<NoteId, Note>,
    encrypted: HashMap<NoteId, EncryptedNote>,
    current: Option<NoteId>,
}

struct PendingWrite {
    handle: JoinHandle<()>,
    note: EncryptedNote,
}

struct Inner {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn LocalCache>,
    key: AccountKey,
    account_id: String,
    state: Mutex<SyncState>,
    pending_edits: Mutex<HashMap<NoteId, PendingWrite>>,
    pending_writes: AtomicU64,
    debounce: Duration,
}

impl Inner {
    fn snapshot_entries(&self) -> Vec<(NoteId, EncryptedNote)> {
        let state = self.state.lock();
        let mut entries: Vec<(NoteId, EncryptedNote)> = state
            .encrypted
            .iter()
            .map(|(id, note)| (id.clone(), note.clone()))
            .collect();
        entries.sort_by(|a, b| a.1.created_at.cmp(&b.1.created_at).then(a.0.cmp(&b.0)));
        entries
    }

    /// Write one note to both stores concurrently; neither side failing
    /// aborts the other.
    async fn persist(&self, enc: &EncryptedNote, entries: &[(NoteId, EncryptedNote)]) {
        let (remote_res, cache_res) = tokio::join!(
            with_backoff("write note", || self.remote.put_note(enc)),
            self.cache.store(&self.account_id, entries),
        );
        if let Err(err) = remote_res {
            warn!(id = %enc.id, error = %err, "remote write failed");
            self.pending_writes.fetch_add(1, Ordering::SeqCst);
        }
        if let Err(err) = cache_res {
            warn!(error = %err, "local cache persist failed");
        }
    }
}

/// Reconciles the remote store and local cache into one plaintext working
/// set and performs encrypted write-through for edits. Clone-able handle;
/// clones share state.
#[derive(Clone)]
pub struct NoteSynchronizer {
    inner: Arc<Inner>,
}

impl NoteSynchronizer {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        key: AccountKey,
        account_id: impl Into<String>,
    ) -> Self {
        Self::with_debounce(remote, cache, key, account_id, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        remote: Arc<dyn RemoteStore>,
        cache: Arc<dyn LocalCache>,
        key: AccountKey,
        account_id: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                remote,
                cache,
                key,
                account_id: account_id.into(),
                state: Mutex::new(SyncState::default()),
                pending_edits: Mutex::new(HashMap::new()),
                pending_writes: AtomicU64::new(0),
                debounce,
            }),
        }
    }

    /// Remote writes dropped since the last clean reconciliation. Non-zero
    /// means the local working set has diverged from the remote store.
    pub fn pending_writes(&self) -> u64 {
        self.inner.pending_writes.load(Ordering::SeqCst)
    }

    /// The note receiving edits, set by [`NoteSynchronizer::create`].
    pub fn current_note(&self) -> Option<NoteId> {
        self.inner.state.lock().current.clone()
    }

    pub fn set_current_note(&self, id: Option<NoteId>) {
        self.inner.state.lock().current = id;
    }

    fn decrypt_note(&self, enc: &EncryptedNote) -> Note {
        let title = cipher::decrypt_field(&enc.title, &self.inner.key).unwrap_or_else(|err| {
            warn!(id = %enc.id, error = %err, "title failed to decrypt");
            UNREADABLE_FIELD.to_string()
        });
        let content = cipher::decrypt_field(&enc.content, &self.inner.key).unwrap_or_else(|err| {
            warn!(id = %enc.id, error = %err, "content failed to decrypt");
            UNREADABLE_FIELD.to_string()
        });
        Note {
            id: enc.id.clone(),
            title,
            content,
            created_at: enc.created_at,
            archived: enc.archived,
        }
    }

    fn encrypt_note(&self, note: &Note) -> Result<EncryptedNote, CoreError> {
        Ok(EncryptedNote {
            id: note.id.clone(),
            title: cipher::encrypt_field(&note.title, &self.inner.key)?,
            content: cipher::encrypt_field(&note.content, &self.inner.key)?,
            created_at: note.created_at,
            archived: note.archived,
        })
    }

    /// Rebuild the plaintext working set from both stores.
    ///
    /// Fans out to the remote store and the local cache concurrently and
    /// tolerates either source failing on its own. Reconciliation: local
    /// notes missing remotely are pushed back; remote `archived` notes are
    /// evicted locally even if still cached; every other remote copy wins.
    /// The reconciled encrypted set is persisted to the cache before
    /// decryption.
    pub async fn read_all(&self) -> Result<HashMap<NoteId, Note>, CoreError> {
        let (remote_res, local_res) = tokio::join!(
            with_backoff("list notes", || self.inner.remote.list_notes()),
            self.inner.cache.load(&self.inner.account_id),
        );

        let mut merged: HashMap<NoteId, EncryptedNote> = match local_res {
            Ok(Some(entries)) => entries.into_iter().collect(),
            Ok(None) => HashMap::new(),
            Err(err) => {
                warn!(error = %err, "local cache read failed");
                HashMap::new()
            }
        };

        match remote_res {
            Ok(remote_notes) => {
                let remote_ids: HashSet<NoteId> =
                    remote_notes.iter().map(|n| n.id.clone()).collect();
                let mut repair_failed = false;
                for (id, note) in &merged {
                    if !remote_ids.contains(id) {
                        debug!(%id, "pushing locally cached note missing from remote");
                        if let Err(err) =
                            with_backoff("repair note", || self.inner.remote.put_note(note)).await
                        {
                            warn!(%id, error = %err, "repair push failed");
                            self.inner.pending_writes.fetch_add(1, Ordering::SeqCst);
                            repair_failed = true;
                        }
                    }
                }
                for note in remote_notes {
                    if note.archived {
                        merged.remove(&note.id);
                    } else {
                        merged.insert(note.id.clone(), note);
                    }
                }
                if !repair_failed {
                    self.inner.pending_writes.store(0, Ordering::SeqCst);
                }
            }
            Err(err) => {
                warn!(error = %err, "remote store unreachable, serving cached notes");
            }
        }

        let mut plain: HashMap<NoteId, Note> = HashMap::with_capacity(merged.len());
        for (id, enc) in &merged {
            plain.insert(id.clone(), self.decrypt_note(enc));
        }

        {
            let mut state = self.inner.state.lock();
            state.encrypted = merged;
            state.notes = plain.clone();
        }
        let entries = self.inner.snapshot_entries();
        if let Err(err) = self.inner.cache.store(&self.inner.account_id, &entries).await {
            warn!(error = %err, "local cache persist failed");
        }

        Ok(plain)
    }

    /// Explicit re-sync, invoked by the caller at its chosen cadence.
    pub async fn refresh(&self) -> Result<HashMap<NoteId, Note>, CoreError> {
        self.read_all().await
    }

    /// Create a fresh untitled note, write it through to both stores and
    /// mark it current for subsequent edits.
    pub async fn create(&self) -> Result<Note, CoreError> {
        let note = Note::untitled();
        let enc = self.encrypt_note(&note)?;
        {
            let mut state = self.inner.state.lock();
            state.notes.insert(note.id.clone(), note.clone());
            state.encrypted.insert(note.id.clone(), enc.clone());
            state.current = Some(note.id.clone());
        }
        let entries = self.inner.snapshot_entries();
        self.inner.persist(&enc, &entries).await;
        Ok(note)
    }

    /// Apply an edit optimistically and schedule the write-through after
    /// the quiet period. Rapid sequential edits to the same note coalesce:
    /// a newer edit supersedes that note's in-flight scheduled write, so
    /// only the latest value is ultimately persisted. Edits to different
    /// notes are independent and each reach the remote store.
    pub async fn update(&self, id: &NoteId, title: &str, content: &str) -> Result<(), CoreError> {
        let updated = {
            let mut state = self.inner.state.lock();
            let note = state
                .notes
                .get_mut(id)
                .ok_or_else(|| CoreError::NotFound(id.clone()))?;
            note.title = title.to_string();
            note.content = content.to_string();
            note.clone()
        };
        let enc = self.encrypt_note(&updated)?;
        self.inner
            .state
            .lock()
            .encrypted
            .insert(id.clone(), enc.clone());
        self.schedule_write(enc);
        Ok(())
    }

    fn schedule_write(&self, enc: EncryptedNote) {
        let inner = Arc::clone(&self.inner);
        let task_note = enc.clone();
        let mut pending = self.inner.pending_edits.lock();
        if let Some(previous) = pending.remove(&enc.id) {
            previous.handle.abort();
        }
        let handle = tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let entries = inner.snapshot_entries();
            inner.persist(&task_note, &entries).await;
            // Clear our own slot unless a newer edit already replaced it.
            let mut pending = inner.pending_edits.lock();
            if pending.get(&task_note.id).is_some_and(|p| p.note == task_note) {
                pending.remove(&task_note.id);
            }
        });
        pending.insert(enc.id.clone(), PendingWrite { handle, note: enc });
    }

    /// Run every in-flight debounced write immediately. Called on logout so
    /// no coalesced edit is lost with the session.
    pub async fn flush(&self) {
        let pending: Vec<PendingWrite> = {
            let mut map = self.inner.pending_edits.lock();
            map.drain().map(|(_, p)| p).collect()
        };
        for previous in pending {
            previous.handle.abort();
            let entries = self.inner.snapshot_entries();
            self.inner.persist(&previous.note, &entries).await;
        }
    }

    /// Soft-delete: tombstone the note remotely and evict it locally. The
    /// remote document is never physically removed. A scheduled edit for
    /// the note is discarded; archival is terminal and a late write must
    /// not re-create the document.
    pub async fn delete(&self, id: &NoteId) -> Result<(), CoreError> {
        if let Some(previous) = self.inner.pending_edits.lock().remove(id) {
            previous.handle.abort();
        }
        {
            let mut state = self.inner.state.lock();
            state.notes.remove(id);
            state.encrypted.remove(id);
            if state.current.as_ref() == Some(id) {
                state.current = None;
            }
        }
        let entries = self.inner.snapshot_entries();
        let (remote_res, cache_res) = tokio::join!(
            with_backoff("archive note", || self.inner.remote.archive_note(id)),
            self.inner.cache.store(&self.inner.account_id, &entries),
        );
        if let Err(err) = remote_res {
            warn!(%id, error = %err, "remote archive failed");
            self.inner.pending_writes.fetch_add(1, Ordering::SeqCst);
        }
        if let Err(err) = cache_res {
            warn!(error = %err, "local cache persist failed");
        }
        Ok(())
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lockleaf_core::memory::{MemoryCache, MemoryRemote};
use lockleaf_core::model::EncryptedNote;
use lockleaf_core::store::{LocalCache, RemoteStore};
use lockleaf_core::sync::{NoteSynchronizer, UNREADABLE_FIELD};
use lockleaf_crypto::{cipher, AccountKey};

const ACCOUNT: &str = "acct-1";

fn synchronizer(
    remote: &Arc<MemoryRemote>,
    cache: &Arc<MemoryCache>,
    key: &AccountKey,
) -> NoteSynchronizer {
    NoteSynchronizer::new(remote.clone(), cache.clone(), key.clone(), ACCOUNT)
}

fn encrypted_note(key: &AccountKey, id: &str, title: &str, content: &str) -> EncryptedNote {
    EncryptedNote {
        id: id.to_string(),
        title: cipher::encrypt_field(title, key).unwrap(),
        content: cipher::encrypt_field(content, key).unwrap(),
        created_at: Utc::now(),
        archived: false,
    }
}

#[tokio::test]
async fn create_writes_both_stores() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();

    let stored = remote.raw_note(&note.id).unwrap();
    assert_eq!(cipher::decrypt_field(&stored.title, &key).unwrap(), "Untitled Note");
    let cached = cache.load(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0].0, note.id);
    assert_eq!(sync.current_note(), Some(note.id));
}

#[tokio::test]
async fn read_all_decrypts_remote_notes() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    remote
        .put_note(&encrypted_note(&key, "n1", "Groceries", "milk"))
        .await
        .unwrap();

    let sync = synchronizer(&remote, &cache, &key);
    let map = sync.read_all().await.unwrap();

    assert_eq!(map.len(), 1);
    assert_eq!(map["n1"].title, "Groceries");
    assert_eq!(map["n1"].content, "milk");
}

#[tokio::test]
async fn tombstone_evicts_cached_copy() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();
    assert!(cache.load(ACCOUNT).await.unwrap().unwrap().len() == 1);

    // Another device archives the note remotely.
    remote.archive_note(&note.id).await.unwrap();

    let map = sync.read_all().await.unwrap();
    assert!(map.is_empty());
    assert!(cache.load(ACCOUNT).await.unwrap().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn remote_outage_serves_cached_notes() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();

    let seeder = synchronizer(&remote, &cache, &key);
    for _ in 0..3 {
        seeder.create().await.unwrap();
    }

    remote.set_offline(true);
    let sync = synchronizer(&remote, &cache, &key);
    let map = sync.read_all().await.unwrap();
    assert_eq!(map.len(), 3);
    for note in map.values() {
        assert_eq!(note.title, "Untitled Note");
    }
}

#[tokio::test]
async fn local_only_note_is_pushed_to_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let orphan = encrypted_note(&key, "n1", "Survivor", "of a partitioned write");
    cache
        .store(ACCOUNT, &[("n1".to_string(), orphan)])
        .await
        .unwrap();

    let sync = synchronizer(&remote, &cache, &key);
    let map = sync.read_all().await.unwrap();

    assert_eq!(map["n1"].title, "Survivor");
    assert!(remote.raw_note("n1").is_some());
}

#[tokio::test(start_paused = true)]
async fn rapid_updates_coalesce_into_one_write() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();
    let writes_before = remote.note_writes();

    sync.update(&note.id, "draft", "first value").await.unwrap();
    sync.update(&note.id, "Groceries", "milk").await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;

    assert_eq!(remote.note_writes(), writes_before + 1);
    let stored = remote.raw_note(&note.id).unwrap();
    assert_eq!(cipher::decrypt_field(&stored.title, &key).unwrap(), "Groceries");
    assert_eq!(cipher::decrypt_field(&stored.content, &key).unwrap(), "milk");
}

#[tokio::test(start_paused = true)]
async fn edits_to_distinct_notes_both_persist() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let a = sync.create().await.unwrap();
    let b = sync.create().await.unwrap();
    let writes_before = remote.note_writes();

    // Both edits land inside the same quiet period.
    sync.update(&a.id, "A title", "alpha").await.unwrap();
    sync.update(&b.id, "B title", "beta").await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;

    assert_eq!(remote.note_writes(), writes_before + 2);
    let stored_a = remote.raw_note(&a.id).unwrap();
    assert_eq!(cipher::decrypt_field(&stored_a.title, &key).unwrap(), "A title");
    let stored_b = remote.raw_note(&b.id).unwrap();
    assert_eq!(cipher::decrypt_field(&stored_b.title, &key).unwrap(), "B title");
}

#[tokio::test(start_paused = true)]
async fn delete_discards_scheduled_edit() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();
    sync.update(&note.id, "Groceries", "milk").await.unwrap();
    sync.delete(&note.id).await.unwrap();
    let writes_after_delete = remote.note_writes();

    tokio::time::sleep(Duration::from_millis(600)).await;
    tokio::task::yield_now().await;

    // The archive is terminal; the superseded edit never runs.
    assert!(remote.raw_note(&note.id).unwrap().archived);
    assert_eq!(remote.note_writes(), writes_after_delete);
}

#[tokio::test]
async fn flush_persists_pending_edit_immediately() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();
    sync.update(&note.id, "Groceries", "milk").await.unwrap();
    sync.flush().await;

    let stored = remote.raw_note(&note.id).unwrap();
    assert_eq!(cipher::decrypt_field(&stored.title, &key).unwrap(), "Groceries");
}

#[tokio::test]
async fn delete_tombstones_remotely_and_evicts_locally() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let note = sync.create().await.unwrap();
    sync.delete(&note.id).await.unwrap();

    // Soft delete: the remote document survives with the archived marker.
    assert!(remote.raw_note(&note.id).unwrap().archived);
    assert!(cache.load(ACCOUNT).await.unwrap().unwrap().is_empty());
    assert!(sync.read_all().await.unwrap().is_empty());
    assert_eq!(sync.current_note(), None);
}

#[tokio::test]
async fn unreadable_field_degrades_to_placeholder() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let mut note = encrypted_note(&key, "n1", "ignored", "still readable");
    note.title = "!!! not a ciphertext blob !!!".to_string();
    remote.put_note(&note).await.unwrap();

    let sync = synchronizer(&remote, &cache, &key);
    let map = sync.read_all().await.unwrap();

    assert_eq!(map["n1"].title, UNREADABLE_FIELD);
    assert_eq!(map["n1"].content, "still readable");
}

#[tokio::test(start_paused = true)]
async fn dropped_remote_writes_are_observable() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    remote.set_offline(true);
    let note = sync.create().await.unwrap();
    assert_eq!(sync.pending_writes(), 1);

    // The edit survived locally even though the remote write was dropped.
    let cached = cache.load(ACCOUNT).await.unwrap().unwrap();
    assert_eq!(cached.len(), 1);

    // Once the remote is reachable again, reconciliation repairs the gap
    // and clears the counter.
    remote.set_offline(false);
    let map = sync.read_all().await.unwrap();
    assert_eq!(map.len(), 1);
    assert!(remote.raw_note(&note.id).is_some());
    assert_eq!(sync.pending_writes(), 0);
}

#[tokio::test]
async fn cache_write_failure_does_not_block_remote_write() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    cache.set_fail_writes(true);
    let note = sync.create().await.unwrap();

    assert!(remote.raw_note(&note.id).is_some());
    assert!(cache.load(ACCOUNT).await.unwrap().is_none());
}

#[tokio::test]
async fn update_unknown_note_is_an_error() {
    let remote = Arc::new(MemoryRemote::new());
    let cache = Arc::new(MemoryCache::new());
    let key = AccountKey::generate();
    let sync = synchronizer(&remote, &cache, &key);

    let err = sync
        .update(&"missing".to_string(), "t", "c")
        .await
        .unwrap_err();
    assert!(matches!(err, lockleaf_core::CoreError::NotFound(_)));
}

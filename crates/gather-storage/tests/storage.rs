use gather_storage::{
    CredentialStorage, CredentialStore, MemoryCredentialStore, NewCredential, StorageError,
};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

async fn sqlite() -> CredentialStorage {
    let storage = CredentialStorage::connect("sqlite::memory:").await.unwrap();
    storage.sync().await.unwrap();
    storage
}

async fn exercise_lru_listing(store: &dyn CredentialStore) {
    let used_old = store
        .insert(NewCredential::new("reddit", "free", json!({ "api_key": "a" })))
        .await
        .unwrap();
    let used_recent = store
        .insert(NewCredential::new("reddit", "free", json!({ "api_key": "b" })))
        .await
        .unwrap();
    let never = store
        .insert(NewCredential::new("reddit", "free", json!({ "api_key": "c" })))
        .await
        .unwrap();
    store
        .insert(NewCredential::new("reddit", "free", json!({ "api_key": "d" })).inactive())
        .await
        .unwrap();
    store
        .insert(NewCredential::new("reddit", "premium", json!({ "api_key": "e" })))
        .await
        .unwrap();

    let now = OffsetDateTime::now_utc();
    store
        .touch_last_used(used_old, now - Duration::hours(2))
        .await
        .unwrap();
    store.touch_last_used(used_recent, now).await.unwrap();

    let ids: Vec<Uuid> = store
        .list_active("reddit", "free")
        .await
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();
    assert_eq!(ids, vec![never, used_old, used_recent]);
}

async fn exercise_error_bookkeeping(store: &dyn CredentialStore) {
    let id = store
        .insert(NewCredential::new("youtube", "free", json!({ "api_key": "k" })).with_daily_quota(2))
        .await
        .unwrap();
    assert_eq!(store.error_count(id).await.unwrap(), Some(0));

    let at = OffsetDateTime::now_utc();
    store.record_error(id, 3, at).await.unwrap();
    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.error_count, 3);
    assert!(record.last_error_at.is_some());
    assert_eq!(record.daily_quota, Some(2));

    store.reset_errors(id).await.unwrap();
    let record = store.get(id).await.unwrap().unwrap();
    assert_eq!(record.error_count, 0);
    assert!(record.last_error_at.is_none());

    let missing = Uuid::new_v4();
    assert_eq!(store.error_count(missing).await.unwrap(), None);
    assert!(matches!(
        store.record_error(missing, 1, at).await,
        Err(StorageError::NotFound(found)) if found == missing
    ));
}

#[tokio::test]
async fn sqlite_lists_least_recently_used_first() {
    let storage = sqlite().await;
    storage.health().await.unwrap();
    exercise_lru_listing(&storage).await;
}

#[tokio::test]
async fn sqlite_error_bookkeeping() {
    let storage = sqlite().await;
    exercise_error_bookkeeping(&storage).await;
}

#[tokio::test]
async fn sqlite_round_trips_plain_object_payload() {
    let storage = sqlite().await;
    let payload = json!({ "client_id": "cid", "client_secret": "sec" });
    let id = storage
        .insert(NewCredential::new("reddit", "oauth2", payload.clone()).with_monthly_quota(100))
        .await
        .unwrap();
    let record = storage.get(id).await.unwrap().unwrap();
    assert_eq!(record.encrypted_payload, payload);
    assert_eq!(record.monthly_quota, Some(100));
    assert!(record.is_active);
}

#[tokio::test]
async fn memory_store_matches_sqlite_ordering() {
    let store = MemoryCredentialStore::new();
    exercise_lru_listing(&store).await;
}

#[tokio::test]
async fn memory_store_error_bookkeeping() {
    let store = MemoryCredentialStore::new();
    exercise_error_bookkeeping(&store).await;
}

#[tokio::test]
async fn memory_store_counts_failed_writes() {
    let store = MemoryCredentialStore::new();
    let id = store
        .insert(NewCredential::new("rss", "free", json!({ "api_key": "k" })))
        .await
        .unwrap();
    store.fail_writes(true);
    let before = store.write_attempts();
    assert!(store
        .touch_last_used(id, OffsetDateTime::now_utc())
        .await
        .is_err());
    assert_eq!(store.write_attempts(), before + 1);

    store.fail_reads(true);
    assert!(matches!(
        store.list_active("rss", "free").await,
        Err(StorageError::Unavailable(_))
    ));
}

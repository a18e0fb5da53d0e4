use std::time::Duration;

use gather_coord::{CoordinationStore, MemoryStore, StoreError};

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn window_admits_up_to_limit() {
    let store = MemoryStore::new();
    let now = 1_000_000;
    assert!(store.window_acquire("w", now, MINUTE, 2, "a", MINUTE).await.unwrap());
    assert!(store.window_acquire("w", now + 1, MINUTE, 2, "b", MINUTE).await.unwrap());
    assert!(!store.window_acquire("w", now + 2, MINUTE, 2, "c", MINUTE).await.unwrap());
    assert_eq!(store.window_count("w", now + 2, MINUTE).await.unwrap(), 2);
}

#[tokio::test]
async fn aged_out_members_free_slots() {
    let store = MemoryStore::new();
    let now = 5_000_000;
    assert!(store.window_acquire("w", now, MINUTE, 1, "a", MINUTE).await.unwrap());
    assert!(!store.window_acquire("w", now + 59_999, MINUTE, 1, "b", MINUTE).await.unwrap());
    assert!(store.window_acquire("w", now + 60_000, MINUTE, 1, "c", MINUTE).await.unwrap());
    assert_eq!(
        store.window_oldest("w", now + 60_000, MINUTE).await.unwrap(),
        Some(now + 60_000)
    );
}

#[tokio::test]
async fn oldest_and_remove() {
    let store = MemoryStore::new();
    let now = 10_000;
    store.window_acquire("w", now, MINUTE, 5, "a", MINUTE).await.unwrap();
    store.window_acquire("w", now + 10, MINUTE, 5, "b", MINUTE).await.unwrap();
    assert_eq!(store.window_oldest("w", now + 20, MINUTE).await.unwrap(), Some(now));
    store.window_remove("w", "a").await.unwrap();
    assert_eq!(store.window_oldest("w", now + 20, MINUTE).await.unwrap(), Some(now + 10));
    assert_eq!(store.window_count("w", now + 20, MINUTE).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn counter_ttl_is_set_only_on_first_increment() {
    let store = MemoryStore::new();
    assert_eq!(store.incr_with_expiry("q", Duration::from_secs(10)).await.unwrap(), 1);
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(store.incr_with_expiry("q", Duration::from_secs(10)).await.unwrap(), 2);
    let ttl = store.ttl("q").await.unwrap().unwrap();
    assert!(ttl <= Duration::from_secs(4));
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(store.get_int("q").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn set_ex_expires() {
    let store = MemoryStore::new();
    store.set_ex("cooldown:x", "3", Duration::from_secs(60)).await.unwrap();
    assert!(store.exists("cooldown:x").await.unwrap());
    assert_eq!(store.get_int("cooldown:x").await.unwrap(), Some(3));
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(!store.exists("cooldown:x").await.unwrap());
}

#[tokio::test]
async fn scan_and_delete_by_prefix() {
    let store = MemoryStore::new();
    let hour = Duration::from_secs(3600);
    store.set_ex("lease:c1:t1", "reddit", hour).await.unwrap();
    store.set_ex("lease:c1:t2", "reddit", hour).await.unwrap();
    store.set_ex("lease:c2:t1", "reddit", hour).await.unwrap();
    let keys = store.scan_prefix("lease:c1:").await.unwrap();
    assert_eq!(keys, vec!["lease:c1:t1".to_string(), "lease:c1:t2".to_string()]);
    assert_eq!(store.delete(&keys).await.unwrap(), 2);
    assert_eq!(store.keys().await, vec!["lease:c2:t1".to_string()]);
}

#[tokio::test]
async fn unavailable_store_fails_every_call() {
    let store = MemoryStore::new();
    store.set_unavailable(true);
    assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));
    assert!(store.exists("k").await.is_err());
    assert!(store.window_acquire("w", 0, MINUTE, 1, "a", MINUTE).await.is_err());
    store.set_unavailable(false);
    assert!(store.ping().await.is_ok());
}

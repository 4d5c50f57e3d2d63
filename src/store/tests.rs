use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::memory::MemoryStore;
use super::{CasToken, Expiry, Item, KeyValueStore, StoreError, decode_counter, encode_counter};

#[test]
fn test_cas_token_tracks_value() {
    let a = CasToken::of("k", b"one");
    let b = CasToken::of("k", b"one");
    let c = CasToken::of("k", b"two");

    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_item_token_matches_value() {
    let item = Item::new("k", b"payload".to_vec());
    assert_eq!(item.token(), &CasToken::of("k", b"payload"));
    assert_eq!(item.value(), b"payload");
}

#[test]
fn test_counter_encoding() {
    assert_eq!(encode_counter(42), b"42".to_vec());
    assert_eq!(decode_counter(b"42"), Some(42));
    assert_eq!(decode_counter(b" 7\r\n"), Some(7));
    assert_eq!(decode_counter(b"-1"), None);
    assert_eq!(decode_counter(b"abc"), None);
    assert_eq!(decode_counter(&[0xff, 0xfe]), None);
}

#[tokio::test]
async fn test_memory_set_get_delete() {
    let store = MemoryStore::new();

    assert!(store.get("k").await.unwrap().is_none());
    assert!(store.set("k", b"v", Expiry::Never).await.unwrap());

    let item = store.get("k").await.unwrap().expect("present");
    assert_eq!(item.value(), b"v");
    assert_eq!(item.token(), &CasToken::of("k", b"v"));

    assert!(store.delete("k").await.unwrap());
    assert!(!store.delete("k").await.unwrap());
    assert!(store.get("k").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_memory_relative_expiry() {
    let store = MemoryStore::new();
    store.set("k", b"v", Expiry::After(10)).await.unwrap();

    let ttl = store.remaining_ttl("k").expect("present").expect("has ttl");
    assert_eq!(ttl, Duration::from_secs(10));

    tokio::time::advance(Duration::from_secs(9)).await;
    assert!(store.contains("k"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!store.contains("k"));
    assert!(store.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_never_expiry_has_no_ttl() {
    let store = MemoryStore::new();
    store.set("k", b"v", Expiry::Never).await.unwrap();

    assert_eq!(store.remaining_ttl("k"), Some(None));
    assert_eq!(store.remaining_ttl("absent"), None);
}

#[tokio::test]
async fn test_memory_past_absolute_expiry_removes_key() {
    let store = MemoryStore::new();
    store.set("k", b"old", Expiry::Never).await.unwrap();

    // A timestamp just past the threshold is decades in the past.
    let past = Expiry::from_secs(super::ABSOLUTE_EXPIRY_THRESHOLD_SECS + 1);
    assert!(store.set("k", b"new", past).await.unwrap());
    assert!(!store.contains("k"));
}

#[tokio::test]
async fn test_memory_add_and_replace_preconditions() {
    let store = MemoryStore::new();

    assert!(!store.replace("k", b"v", Expiry::Never).await.unwrap());
    assert!(store.add("k", b"v1", Expiry::Never).await.unwrap());
    assert!(!store.add("k", b"v2", Expiry::Never).await.unwrap());
    assert_eq!(store.peek("k").unwrap(), b"v1");

    assert!(store.replace("k", b"v3", Expiry::Never).await.unwrap());
    assert_eq!(store.peek("k").unwrap(), b"v3");
}

#[tokio::test]
async fn test_memory_cas() {
    let store = MemoryStore::new();
    store.set("k", b"v1", Expiry::Never).await.unwrap();

    let token = *store.get("k").await.unwrap().unwrap().token();
    store.set("k", b"v2", Expiry::Never).await.unwrap();

    assert!(!store.cas(&token, "k", b"v3", Expiry::Never).await.unwrap());

    let fresh = *store.get("k").await.unwrap().unwrap().token();
    assert!(store.cas(&fresh, "k", b"v3", Expiry::Never).await.unwrap());
    assert_eq!(store.peek("k").unwrap(), b"v3");

    assert!(!store.cas(&fresh, "absent", b"x", Expiry::Never).await.unwrap());
}

#[tokio::test]
async fn test_memory_counters() {
    let store = MemoryStore::new();

    assert_eq!(
        store.increment("c", 1, 0, Expiry::Never).await.unwrap(),
        Some(1)
    );
    assert_eq!(
        store.increment("c", 5, 0, Expiry::Never).await.unwrap(),
        Some(6)
    );
    assert_eq!(store.peek("c").unwrap(), b"6");

    assert_eq!(
        store.decrement("c", 10, 0, Expiry::Never).await.unwrap(),
        Some(0)
    );
    assert_eq!(
        store.decrement("fresh", 1, 10, Expiry::Never).await.unwrap(),
        Some(9)
    );
}

#[tokio::test]
async fn test_memory_counter_on_non_numeric_value() {
    let store = MemoryStore::new();
    store.set("c", b"not a number", Expiry::Never).await.unwrap();

    let result = store.increment("c", 1, 0, Expiry::Never).await;
    assert!(matches!(result, Err(StoreError::NotACounter { ref key }) if key == "c"));
}

#[tokio::test(start_paused = true)]
async fn test_memory_counter_keeps_deadline() {
    let store = MemoryStore::new();
    store.increment("c", 1, 0, Expiry::After(10)).await.unwrap();

    tokio::time::advance(Duration::from_secs(5)).await;
    store.increment("c", 1, 0, Expiry::After(100)).await.unwrap();

    let ttl = store.remaining_ttl("c").unwrap().unwrap();
    assert_eq!(ttl, Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_memory_touch() {
    let store = MemoryStore::new();

    assert!(!store.touch("k", Expiry::After(10)).await.unwrap());

    store.set("k", b"v", Expiry::After(5)).await.unwrap();
    assert!(store.touch("k", Expiry::After(60)).await.unwrap());

    tokio::time::advance(Duration::from_secs(30)).await;
    assert_eq!(store.peek("k").unwrap(), b"v");
}

#[tokio::test]
async fn test_memory_multi_operations() {
    let store = MemoryStore::new();
    let items: HashMap<String, Vec<u8>> = [
        ("a".to_string(), b"1".to_vec()),
        ("b".to_string(), b"2".to_vec()),
    ]
    .into_iter()
    .collect();

    let results = store.set_multi(&items, Expiry::Never).await.unwrap();
    assert!(results.values().all(|ok| *ok));

    let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let found = store.get_multi(&keys).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found["a"], b"1");

    let deleted = store.delete_multi(&keys).await.unwrap();
    assert!(deleted["a"]);
    assert!(deleted["b"]);
    assert!(!deleted["c"]);
}

#[tokio::test]
async fn test_memory_collections_are_isolated_and_memoized() {
    let store = MemoryStore::new();
    store.set("k", b"root", Expiry::Never).await.unwrap();

    let users = store.collection("users").await.unwrap();
    assert!(users.get("k").await.unwrap().is_none());
    users.set("k", b"user", Expiry::Never).await.unwrap();

    let again = store.collection("users").await.unwrap();
    assert_eq!(again.get("k").await.unwrap().unwrap().value(), b"user");
    assert_eq!(store.peek("k").unwrap(), b"root");
}

#[tokio::test]
async fn test_memory_flush_clears_collections() {
    let store = MemoryStore::new();
    store.set("k", b"root", Expiry::Never).await.unwrap();
    let users = store.collection("users").await.unwrap();
    users.set("k", b"user", Expiry::Never).await.unwrap();

    assert!(store.flush().await.unwrap());

    assert!(store.get("k").await.unwrap().is_none());
    assert!(users.get("k").await.unwrap().is_none());
}

#[tokio::test]
async fn test_memory_flush_collection_leaves_parent() {
    let store = MemoryStore::new();
    store.set("k", b"root", Expiry::Never).await.unwrap();
    let users = store.collection("users").await.unwrap();
    users.set("k", b"user", Expiry::Never).await.unwrap();

    users.flush().await.unwrap();

    assert_eq!(store.peek("k").unwrap(), b"root");
}

#[test]
fn test_memory_capacity_and_debug() {
    let store = MemoryStore::with_capacity(42);
    assert_eq!(store.capacity(), 42);
    assert!(store.is_empty());

    let debug = format!("{:?}", store);
    assert!(debug.contains("MemoryStore"));
    assert!(debug.contains("capacity: 42"));
}

const RESET_VALUE: u64 = 1_000_000;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_set_is_not_lost_under_concurrent_increments() {
    for _ in 0..20 {
        let store = Arc::new(MemoryStore::new());
        store.set("c", b"0", Expiry::Never).await.unwrap();

        let incrementers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let mut seen = Vec::with_capacity(250);
                    for _ in 0..250 {
                        let value = store.increment("c", 1, 0, Expiry::Never).await.unwrap();
                        seen.push(value.expect("memory counters always update"));
                    }
                    seen
                })
            })
            .collect();

        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                store
                    .set("c", &encode_counter(RESET_VALUE), Expiry::Never)
                    .await
                    .unwrap();
            })
        };

        let mut after_reset = 0u64;
        for handle in futures_util::future::join_all(incrementers).await {
            let seen = handle.unwrap();
            after_reset += seen.iter().filter(|&&v| v > RESET_VALUE).count() as u64;
        }
        writer.await.unwrap();

        // Every increment ordered after the write builds on it, so none of
        // them and not the write itself can be lost.
        let last = decode_counter(&store.peek("c").unwrap()).unwrap();
        assert_eq!(last, RESET_VALUE + after_reset);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_cas_and_delete_do_not_interleave() {
    for _ in 0..50 {
        let store = Arc::new(MemoryStore::new());
        store.set("k", b"v1", Expiry::Never).await.unwrap();
        let token = CasToken::of("k", b"v1");

        let cas = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.cas(&token, "k", b"v2", Expiry::Never).await })
        };
        let delete = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.delete("k").await })
        };

        let swapped = cas.await.unwrap().unwrap();
        let deleted = delete.await.unwrap().unwrap();

        // Either order ends with the key gone: a CAS that ran first is
        // deleted, and a CAS that ran second finds nothing to swap.
        assert!(deleted);
        assert!(
            store.peek("k").is_none(),
            "value survived delete (cas succeeded: {swapped})"
        );
    }
}

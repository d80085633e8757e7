use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use crate::clock::{Clock, ManualClock};
use crate::completion::{ChatMessage, CompletionRequest};

use super::{fingerprint, CacheConfig, TtlCache};

const TTL: Duration = Duration::from_secs(60);

fn cache(capacity: usize) -> (TtlCache<String, String>, Arc<ManualClock>) {
    let clock = ManualClock::shared();
    let config = CacheConfig::new(capacity, TTL).expect("config");
    let cache = TtlCache::with_clock(config, clock.clone()).expect("cache");
    (cache, clock)
}

fn key(i: usize) -> String {
    format!("k{i}")
}

#[test]
fn put_then_get_returns_value() {
    let (cache, _) = cache(4);
    cache.put(key(1), "one".to_string());
    assert_eq!(cache.get(&key(1)), Some("one".to_string()));
    assert_eq!(cache.size(), 1);
}

#[test]
fn overwrite_keeps_single_entry() {
    let (cache, _) = cache(2);
    cache.put(key(1), "old".to_string());
    cache.put(key(1), "new".to_string());
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.get(&key(1)), Some("new".to_string()));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn entry_expires_at_ttl() {
    let (cache, clock) = cache(4);
    cache.put(key(1), "one".to_string());

    clock.advance(TTL - Duration::from_millis(1));
    assert!(cache.get(&key(1)).is_some());

    clock.advance(Duration::from_millis(1));
    assert_eq!(cache.get(&key(1)), None);
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.stats().expirations, 1);
}

#[test]
fn inserted_at_tracks_latest_put_and_hides_expired_entries() {
    let (cache, clock) = cache(4);
    assert_eq!(cache.inserted_at(&key(1)), None);

    let first = clock.now();
    cache.put(key(1), "one".to_string());
    assert_eq!(cache.inserted_at(&key(1)), Some(first));

    clock.advance(TTL / 2);
    assert_eq!(cache.get(&key(1)), Some("one".to_string()));
    assert_eq!(cache.inserted_at(&key(1)), Some(first));

    cache.put(key(1), "again".to_string());
    let second = clock.now();
    assert_eq!(cache.inserted_at(&key(1)), Some(second));

    let hits = cache.hits();
    clock.advance(TTL);
    assert_eq!(cache.inserted_at(&key(1)), None);
    assert_eq!(cache.hits(), hits);
}

#[test]
fn hit_does_not_extend_ttl() {
    let (cache, clock) = cache(4);
    cache.put(key(1), "one".to_string());
    clock.advance(TTL / 2);
    assert!(cache.get(&key(1)).is_some());
    clock.advance(TTL / 2);
    assert_eq!(cache.get(&key(1)), None);
}

#[test]
fn overflow_evicts_first_inserted() {
    let (cache, _) = cache(3);
    for i in 0..4 {
        cache.put(key(i), format!("v{i}"));
    }
    assert_eq!(cache.size(), 3);
    assert!(!cache.contains_key(&key(0)));
    for i in 1..4 {
        assert!(cache.contains_key(&key(i)));
    }
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn get_refreshes_recency() {
    let (cache, _) = cache(3);
    for i in 0..3 {
        cache.put(key(i), format!("v{i}"));
    }
    assert!(cache.get(&key(0)).is_some());
    cache.put(key(3), "v3".to_string());

    assert!(cache.contains_key(&key(0)));
    assert!(!cache.contains_key(&key(1)));
}

#[test]
fn counters_and_hit_rate() {
    let (cache, _) = cache(3);
    assert_eq!(cache.hit_rate(), 0.0);

    cache.put(key(1), "one".to_string());
    cache.get(&key(1));
    cache.get(&key(1));
    cache.get(&key(1));
    cache.get(&key(2));

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.capacity, 3);
    assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
}

#[test]
fn clear_resets_entries_and_counters() {
    let (cache, _) = cache(3);
    cache.put(key(1), "one".to_string());
    cache.get(&key(1));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.hits(), 0);
    assert_eq!(cache.misses(), 0);
}

#[test]
fn remove_drops_entry() {
    let (cache, _) = cache(3);
    cache.put(key(1), "one".to_string());
    assert_eq!(cache.remove(&key(1)), Some("one".to_string()));
    assert_eq!(cache.get(&key(1)), None);
}

#[test]
fn rejects_invalid_configuration() {
    assert!(CacheConfig::new(0, TTL).is_err());
    assert!(CacheConfig::new(1, Duration::ZERO).is_err());
    let config = CacheConfig {
        capacity: 0,
        ttl: TTL,
    };
    assert!(TtlCache::<String, String>::new(config).is_err());
}

#[test]
fn fingerprint_depends_on_relevant_fields() {
    let base = CompletionRequest::new("hello").model("gpt-4o").temperature(0.0);
    let same = CompletionRequest::new("hello").model("gpt-4o").temperature(0.0);
    assert_eq!(fingerprint(&base), fingerprint(&same));
    assert_eq!(fingerprint(&base).len(), 64);

    let variants = [
        CompletionRequest::new("hello!").model("gpt-4o").temperature(0.0),
        CompletionRequest::new("hello").model("gpt-4o-mini").temperature(0.0),
        CompletionRequest::new("hello").model("gpt-4o").temperature(0.7),
        CompletionRequest::new("hello").model("gpt-4o"),
        CompletionRequest::new("hello")
            .model("gpt-4o")
            .temperature(0.0)
            .max_tokens(10),
        CompletionRequest::from_messages(vec![ChatMessage::system("hello")])
            .model("gpt-4o")
            .temperature(0.0),
    ];
    for variant in &variants {
        assert_ne!(fingerprint(&base), fingerprint(variant));
    }
}

#[test]
fn fingerprint_separates_message_boundaries() {
    let split = CompletionRequest::from_messages(vec![
        ChatMessage::user("ab"),
        ChatMessage::user("c"),
    ]);
    let joined = CompletionRequest::from_messages(vec![
        ChatMessage::user("a"),
        ChatMessage::user("bc"),
    ]);
    assert_ne!(fingerprint(&split), fingerprint(&joined));
}

proptest! {
    #[test]
    fn size_never_exceeds_capacity(capacity in 1usize..16, keys in proptest::collection::vec(0usize..64, 0..128)) {
        let (cache, _) = cache(capacity);
        for k in keys {
            cache.put(key(k), k.to_string());
            prop_assert!(cache.size() <= capacity);
        }
    }

    #[test]
    fn put_then_get_round_trips(k in ".*", v in ".*") {
        let (cache, _) = cache(2);
        cache.put(k.clone(), v.clone());
        prop_assert_eq!(cache.get(&k), Some(v));
    }
}

mod common;

use common::{build_test_cache, insert};
use fibre_slru::{InsertError, SegmentKind};
use std::sync::Arc;

#[test]
fn test_insert_then_find() {
  let cache = build_test_cache(100);
  assert!(cache.find(&1).is_none());

  let inserted = insert(&cache, 1, "one".to_string());
  let found = cache.find(&1).unwrap();
  assert!(Arc::ptr_eq(&inserted, &found));
  assert_eq!(cache.size(), 1);
  assert_eq!(cache.weight(), 1);

  let metrics = cache.metrics();
  assert_eq!(metrics.inserts, 1);
  assert_eq!(metrics.sync_hits, 1);
  assert_eq!(metrics.misses, 1);
  assert_eq!(metrics.current_weight, 1);
}

#[test]
fn test_find_is_idempotent() {
  let cache = build_test_cache(100);
  insert(&cache, 7, "seven".to_string());
  let first = cache.find(&7).unwrap();

  for round in 1..=10u64 {
    let again = cache.find(&7).unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    assert_eq!(cache.metrics().sync_hits, round + 1);
    assert_eq!(cache.weight(), 1);
  }
  assert_eq!(cache.metrics().sync_hit_weight, 11);
}

#[test]
fn test_begin_insert_on_present_key_is_inactive() {
  let cache = build_test_cache(100);
  let mut active = cache.begin_insert(1);
  assert!(active.is_active());

  let pending = cache.begin_insert(1);
  assert!(!pending.is_active());
  assert!(!pending.value().is_ready());

  active.end_insert("one".to_string());
  assert!(!active.is_active());
  assert_eq!(*pending.value().wait().unwrap(), "one");

  let resolved = cache.begin_insert(1);
  assert!(!resolved.is_active());
  assert_eq!(*resolved.value().try_get().unwrap().unwrap(), "one");
  assert_eq!(resolved.key(), &1);
}

#[test]
fn test_lookup_on_pending_is_an_async_hit() {
  let cache = build_test_cache(100);
  assert!(cache.lookup(&1).is_none());

  let mut cookie = cache.begin_insert(1);
  let future = cache.lookup(&1).expect("pending key should yield a future");
  assert!(!future.is_ready());
  assert!(cache.find(&1).is_none(), "find never waits on a pending key");

  cookie.end_insert("one".to_string());
  assert_eq!(*future.wait().unwrap(), "one");

  let metrics = cache.metrics();
  assert_eq!(metrics.async_hits, 1);
  assert_eq!(metrics.misses, 2);
}

#[test]
fn test_cancel_leaves_no_trace() {
  let cache = build_test_cache(100);
  let mut cookie = cache.begin_insert(1);
  let waiter = cache.begin_insert(1);

  cookie.cancel(InsertError::failed("boom"));
  assert!(!cookie.is_active());

  match waiter.value().wait() {
    Err(InsertError::Failed(err)) => assert_eq!(err.to_string(), "boom"),
    other => panic!("unexpected outcome: {other:?}"),
  }
  assert!(cache.find(&1).is_none());
  assert_eq!(cache.metrics().cancellations, 1);

  // The next attempt starts fresh.
  let mut retry = cache.begin_insert(1);
  assert!(retry.is_active());
  retry.end_insert("one".to_string());
  assert_eq!(*cache.find(&1).unwrap(), "one");
}

#[test]
fn test_dropping_active_cookie_aborts() {
  let cache = build_test_cache(100);
  let cookie = cache.begin_insert(1);
  let future = cookie.value();
  drop(cookie);

  assert!(matches!(future.wait(), Err(InsertError::Aborted)));
  assert!(cache.lookup(&1).is_none());
  assert!(cache.begin_insert(1).is_active());
}

#[test]
#[should_panic(expected = "inactive insert cookie")]
fn test_end_insert_twice_panics() {
  let cache = build_test_cache(100);
  let mut cookie = cache.begin_insert(1);
  cookie.end_insert("one".to_string());
  cookie.end_insert("again".to_string());
}

#[test]
#[should_panic(expected = "inactive insert cookie")]
fn test_cancel_on_inactive_cookie_panics() {
  let cache = build_test_cache(100);
  let _active = cache.begin_insert(1);
  let mut follower = cache.begin_insert(1);
  follower.cancel(InsertError::Aborted);
}

#[test]
fn test_try_remove() {
  let cache = build_test_cache(100);
  insert(&cache, 1, "one".to_string());
  insert(&cache, 2, "two".to_string());

  assert!(cache.try_remove(&1, false));
  assert!(!cache.try_remove(&1, false), "double remove should fail");
  assert!(cache.find(&1).is_none());
  assert_eq!(cache.size(), 1);

  let metrics = cache.metrics();
  assert_eq!(metrics.invalidations, 1);
  assert_eq!(metrics.current_weight, 1);
}

#[test]
fn test_try_remove_ignores_pending_keys() {
  let cache = build_test_cache(100);
  let mut cookie = cache.begin_insert(1);
  assert!(!cache.try_remove(&1, true));
  cookie.end_insert("one".to_string());
  assert!(cache.contains_key(&1));
}

#[test]
fn test_clear_keeps_pending_populations() {
  let cache = build_test_cache(100);
  for key in 0..5 {
    insert(&cache, key, key.to_string());
  }
  let mut pending = cache.begin_insert(99);

  cache.clear();
  assert_eq!(cache.size(), 0);
  assert_eq!(cache.weight(), 0);
  assert_eq!(cache.metrics().cleared, 5);
  assert!(cache.lookup(&99).is_some(), "pending item must survive clear");

  pending.end_insert("late".to_string());
  assert_eq!(*cache.find(&99).unwrap(), "late");
}

#[test]
fn test_get_all_peek_and_contains() {
  let cache = build_test_cache(100);
  for key in 0..4 {
    insert(&cache, key, format!("v{key}"));
  }
  let _pending = cache.begin_insert(10);

  let mut all: Vec<String> = cache.get_all().iter().map(|v| v.to_string()).collect();
  all.sort();
  assert_eq!(all, vec!["v0", "v1", "v2", "v3"]);

  let hits_before = cache.metrics().sync_hits;
  assert_eq!(*cache.peek(&2).unwrap(), "v2");
  assert!(cache.peek(&10).is_none());
  assert_eq!(cache.metrics().sync_hits, hits_before, "peek is not a hit");

  assert!(cache.contains_key(&3));
  assert!(!cache.contains_key(&10));
  assert_eq!(cache.segment(&3), Some(SegmentKind::Younger));
  assert_eq!(cache.segment(&10), None);
}

#[test]
fn test_borrowed_key_lookups() {
  let cache = fibre_slru::SlruCacheBuilder::<String, u32>::new()
    .capacity(10)
    .build()
    .unwrap();
  insert(&cache, "alpha".to_string(), 1);

  assert_eq!(*cache.find("alpha").unwrap(), 1);
  assert!(cache.touch("alpha"));
  assert!(cache.try_remove("alpha", false));
  assert!(!cache.contains_key("alpha"));
}

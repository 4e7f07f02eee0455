mod common;

use common::{build_blob_cache, insert, Blob};
use fibre_slru::{InsertError, ResurrectionPolicy, SlruCache, SlruCacheBuilder};
use std::sync::Arc;

fn build(capacity: u64, policy: ResurrectionPolicy) -> SlruCache<i32, String> {
  SlruCacheBuilder::new()
    .capacity(capacity)
    .shards(1)
    .younger_size_fraction(0.5)
    .resurrection(policy)
    .build()
    .unwrap()
}

#[test]
fn test_removed_value_still_referenced_is_readmitted() {
  let cache = build(10, ResurrectionPolicy::Allow);
  let held = insert(&cache, 1, "one".to_string());
  assert!(cache.try_remove(&1, false));
  assert!(!cache.contains_key(&1));

  let cookie = cache.begin_insert(1);
  assert!(!cookie.is_active(), "no new population is needed");
  let value = cookie.value().try_get().unwrap().unwrap();
  assert!(Arc::ptr_eq(&held, &value));
  assert!(Arc::ptr_eq(&held, &cache.find(&1).unwrap()));

  let metrics = cache.metrics();
  assert_eq!(metrics.resurrections, 1);
  assert_eq!(metrics.inserts, 1);
  assert_eq!(metrics.current_weight, 1);
}

#[test]
fn test_capacity_evicted_value_is_readmitted() {
  let cache = build(2, ResurrectionPolicy::Allow);
  let held = insert(&cache, 1, "one".to_string());
  for key in 2..6 {
    insert(&cache, key, key.to_string());
  }
  assert!(!cache.contains_key(&1));

  let cookie = cache.begin_insert(1);
  assert!(!cookie.is_active());
  assert!(Arc::ptr_eq(&held, &cookie.value().wait().unwrap()));
  assert!(cache.contains_key(&1));
  assert!(cache.weight() <= 2);
}

#[test]
fn test_resurrected_value_is_weighed_again() {
  let cache = build_blob_cache(10);
  let held = insert(&cache, 1, Blob::new(1, 2));
  assert!(cache.try_remove(&1, false));
  held.set_weight(5);

  let cookie = cache.begin_insert(1);
  assert!(!cookie.is_active());
  assert!(Arc::ptr_eq(&held, &cookie.value().wait().unwrap()));
  assert_eq!(cache.weight(), 5);
  assert_eq!(cache.metrics().current_weight, 5);
}

#[test]
fn test_unreferenced_value_needs_a_fresh_population() {
  let cache = build(10, ResurrectionPolicy::Allow);
  insert(&cache, 1, "one".to_string());
  assert!(cache.try_remove(&1, false));

  let mut cookie = cache.begin_insert(1);
  assert!(cookie.is_active());
  cookie.end_insert("uno".to_string());
  assert_eq!(*cache.find(&1).unwrap(), "uno");
  assert_eq!(cache.metrics().resurrections, 0);
}

#[test]
fn test_forbid_flag_on_remove_prevents_readmission() {
  let cache = build(10, ResurrectionPolicy::Allow);
  let held = insert(&cache, 1, "one".to_string());
  assert!(cache.try_remove(&1, true));

  let mut cookie = cache.begin_insert(1);
  assert!(cookie.is_active(), "the old value was forgotten");
  cookie.end_insert("fresh".to_string());
  assert!(!Arc::ptr_eq(&held, &cache.find(&1).unwrap()));
}

#[test]
fn test_forbidden_resurrection_fails_until_reference_drops() {
  let cache = build(10, ResurrectionPolicy::Forbid);
  let held = insert(&cache, 1, "one".to_string());
  assert!(cache.try_remove(&1, true));

  let cookie = cache.begin_insert(1);
  assert!(!cookie.is_active());
  assert!(matches!(
    cookie.value().try_get(),
    Some(Err(InsertError::StaleValueAlive))
  ));
  assert!(!cache.contains_key(&1));
  assert!(cache.lookup(&1).is_none(), "a refusal leaves nothing pending");

  drop(held);
  let mut cookie = cache.begin_insert(1);
  assert!(cookie.is_active());
  cookie.end_insert("two".to_string());
  assert_eq!(*cache.find(&1).unwrap(), "two");
}

#[test]
fn test_clear_forgets_evicted_values() {
  let cache = build(10, ResurrectionPolicy::Forbid);
  let _held = insert(&cache, 1, "one".to_string());
  assert!(cache.try_remove(&1, false));
  cache.clear();

  assert!(cache.begin_insert(1).is_active());
}

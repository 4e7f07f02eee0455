mod common;

use common::{insert, Blob};
use fibre_slru::{
  AdmissionDecision, CacheHooks, EvictionReason, MemoryTracker, MemoryUsageTracker,
  OverBudgetPolicy, SlruCacheBuilder,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CountingHooks {
  admitted: AtomicU64,
  removed: AtomicU64,
  reasons: Mutex<Vec<(i32, EvictionReason)>>,
  weight_updates: Mutex<Vec<(u64, u64)>>,
}

impl CacheHooks<i32, Blob> for CountingHooks {
  fn admit(&self, key: &i32, _value: &Arc<Blob>, _weight: u64) -> AdmissionDecision {
    // Negative keys are never cached.
    if *key < 0 {
      AdmissionDecision::Decline
    } else {
      AdmissionDecision::Admit
    }
  }

  fn on_admitted(&self, _key: &i32, _value: &Arc<Blob>, _weight: u64) {
    self.admitted.fetch_add(1, Ordering::SeqCst);
  }

  fn on_removed(&self, key: &i32, _value: &Arc<Blob>, _weight: u64, reason: EvictionReason) {
    self.removed.fetch_add(1, Ordering::SeqCst);
    self.reasons.lock().unwrap().push((*key, reason));
  }

  fn on_weight_updated(&self, _key: &i32, _value: &Arc<Blob>, old_weight: u64, new_weight: u64) {
    self.weight_updates.lock().unwrap().push((old_weight, new_weight));
  }
}

#[test]
fn test_declined_value_reaches_waiters_but_is_not_cached() {
  let hooks = Arc::new(CountingHooks::default());
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(100)
    .shards(1)
    .hooks(hooks.clone())
    .build()
    .unwrap();

  let mut cookie = cache.begin_insert(-1);
  let waiter = cache.lookup(&-1).unwrap();
  cookie.end_insert(Blob::new(-1, 5));

  assert_eq!(waiter.wait().unwrap().key, -1);
  assert!(!cache.contains_key(&-1));
  assert_eq!(cache.weight(), 0);
  assert_eq!(hooks.admitted.load(Ordering::SeqCst), 0);

  let metrics = cache.metrics();
  assert_eq!(metrics.admissions_declined, 1);
  assert_eq!(metrics.inserts, 0);

  // Nothing is left pending.
  assert!(cache.begin_insert(-1).is_active());
}

#[test]
fn test_every_admission_is_paired_with_one_removal() {
  let hooks = Arc::new(CountingHooks::default());
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(10)
    .shards(1)
    .weigher(|blob: &Blob| blob.weight())
    .hooks(hooks.clone())
    .build()
    .unwrap();

  for key in 0..20 {
    insert(&cache, key, Blob::new(key, 2));
  }
  cache.try_remove(&19, false);
  let resident = cache.size() as u64;
  assert_eq!(
    hooks.admitted.load(Ordering::SeqCst) - hooks.removed.load(Ordering::SeqCst),
    resident
  );

  cache.clear();
  assert_eq!(
    hooks.admitted.load(Ordering::SeqCst),
    hooks.removed.load(Ordering::SeqCst)
  );

  let reasons = hooks.reasons.lock().unwrap();
  assert!(reasons.contains(&(19, EvictionReason::Invalidated)));
  assert!(reasons.contains(&(0, EvictionReason::Capacity)));
  assert_eq!(
    reasons
      .iter()
      .filter(|(_, reason)| *reason == EvictionReason::Cleared)
      .count() as u64,
    resident
  );
}

#[test]
fn test_weight_update_hook_sees_old_and_new_weight() {
  let hooks = Arc::new(CountingHooks::default());
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(100)
    .shards(1)
    .weigher(|blob: &Blob| blob.weight())
    .hooks(hooks.clone())
    .build()
    .unwrap();

  let blob = insert(&cache, 1, Blob::new(1, 3));
  blob.set_weight(9);
  assert!(cache.update_weight(&1));
  assert_eq!(*hooks.weight_updates.lock().unwrap(), vec![(3, 9)]);
}

#[test]
fn test_tracker_mirrors_cache_weight() {
  let tracker = Arc::new(MemoryUsageTracker::unlimited());
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(50)
    .shards(1)
    .weigher(|blob: &Blob| blob.weight())
    .memory_tracker(tracker.clone(), OverBudgetPolicy::Admit)
    .build()
    .unwrap();

  let mut blobs = Vec::new();
  for key in 0..30 {
    blobs.push(insert(&cache, key, Blob::new(key, (key % 5 + 1) as u64)));
    assert_eq!(tracker.usage(), cache.weight());
  }

  let survivor = blobs
    .iter()
    .find(|blob| cache.contains_key(&blob.key))
    .unwrap()
    .clone();
  survivor.set_weight(7);
  cache.update_weight_value(&survivor);
  assert_eq!(tracker.usage(), cache.weight());

  cache.try_remove(&survivor.key, false);
  assert_eq!(tracker.usage(), cache.weight());

  // Re-admitted through resurrection, charged again.
  assert!(!cache.begin_insert(survivor.key).is_active());
  assert_eq!(tracker.usage(), cache.weight());

  cache.clear();
  assert_eq!(tracker.usage(), 0);
}

#[test]
fn test_over_budget_values_are_declined() {
  let tracker = Arc::new(MemoryUsageTracker::with_limit(10));
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(100)
    .shards(1)
    .weigher(|blob: &Blob| blob.weight())
    .memory_tracker(tracker.clone(), OverBudgetPolicy::Decline)
    .build()
    .unwrap();

  insert(&cache, 1, Blob::new(1, 6));
  let second = insert(&cache, 2, Blob::new(2, 6));
  assert_eq!(second.key, 2, "the producer's value is still handed out");

  assert!(cache.contains_key(&1));
  assert!(!cache.contains_key(&2));
  assert_eq!(tracker.usage(), 6);
  assert_eq!(cache.metrics().admissions_declined, 1);

  // Room frees up once the first value leaves.
  cache.try_remove(&1, true);
  insert(&cache, 2, Blob::new(2, 6));
  assert!(cache.contains_key(&2));
}

#[test]
fn test_over_budget_values_are_admitted_by_default() {
  let tracker = Arc::new(MemoryUsageTracker::with_limit(4));
  let cache = SlruCacheBuilder::<i32, Blob>::new()
    .capacity(100)
    .shards(1)
    .weigher(|blob: &Blob| blob.weight())
    .memory_tracker(tracker.clone(), OverBudgetPolicy::Admit)
    .build()
    .unwrap();

  insert(&cache, 1, Blob::new(1, 6));
  assert!(cache.contains_key(&1));
  assert_eq!(tracker.usage(), 6);
  assert!(!tracker.has_room(1));
}

#[test]
fn test_tracker_is_shared_between_caches() {
  let tracker = Arc::new(MemoryUsageTracker::with_limit(10));
  let build = || {
    SlruCacheBuilder::<i32, Blob>::new()
      .capacity(100)
      .shards(1)
      .weigher(|blob: &Blob| blob.weight())
      .memory_tracker(tracker.clone(), OverBudgetPolicy::Decline)
      .build()
      .unwrap()
  };
  let first = build();
  let second = build();

  insert(&first, 1, Blob::new(1, 8));
  insert(&second, 1, Blob::new(1, 8));
  assert!(first.contains_key(&1));
  assert!(!second.contains_key(&1));
  assert_eq!(tracker.usage(), 8);
}

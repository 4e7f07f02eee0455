use fibre_slru::{
  EvictionListener, EvictionReason, MemoryTracker, MemoryUsageTracker, OverBudgetPolicy,
  SlruCacheBuilder,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// A simple listener that just prints evicted entries.
struct MyListener;

impl EvictionListener<i32, String> for MyListener {
  fn on_evict(&self, key: i32, value: Arc<String>, reason: EvictionReason) {
    println!(
      "[Listener] Item evicted! Key: {}, Value: '{}', Reason: {}",
      key, value, reason
    );
  }
}

fn insert(cache: &fibre_slru::SlruCache<i32, String>, key: i32, value: &str) {
  let mut cookie = cache.begin_insert(key);
  if cookie.is_active() {
    cookie.end_insert(value.to_string());
  }
}

fn main() {
  println!("--- Cache with Eviction Listener and Memory Budget ---");

  // The budget is shared with the rest of the process; the cache only
  // charges what it keeps.
  let tracker = Arc::new(MemoryUsageTracker::with_limit(64));

  let cache = SlruCacheBuilder::default()
    .capacity(3) // A small capacity to easily trigger evictions
    .shards(1)
    .younger_size_fraction(0.34)
    .eviction_listener(MyListener)
    .memory_tracker(tracker.clone(), OverBudgetPolicy::Decline)
    .build()
    .expect("Failed to build cache");

  insert(&cache, 1, "one");
  insert(&cache, 2, "two");
  insert(&cache, 3, "three");
  println!("\nInserted keys 1, 2, 3. Cache is full.");
  println!("Tracked memory: {}", tracker.usage());

  // A second access promotes key 1 into the protected segment.
  println!("\nAccessing key 1...");
  cache.find(&1);

  println!("\nInserting key 4. This will trigger an eviction.");
  insert(&cache, 4, "four");

  // Give the notifier thread a moment to print.
  thread::sleep(Duration::from_millis(200));

  println!("\n--- Final State ---");
  // The oldest untouched item is key 2.
  assert!(cache.find(&1).is_some(), "Key 1 should be present (was accessed)");
  assert!(cache.find(&2).is_none(), "Key 2 should have been evicted");
  println!("Key 1 is present, key 2 was evicted.");

  cache.try_remove(&3, false);
  cache.clear();
  thread::sleep(Duration::from_millis(200));
  println!("\nTracked memory after clear: {}", tracker.usage());
  println!("Cache metrics: {:#?}", cache.metrics());
}

#![allow(dead_code)]

use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;

use fibre_slru::{CacheValue, SlruCache, SlruCacheBuilder};
use tracing_subscriber::EnvFilter;

/// Routes the cache's `tracing` output to the test harness. Set `RUST_LOG`
/// (e.g. `fibre_slru=trace`) to see it.
pub fn init_logging() {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
}

// A custom hasher that allows us to control which shard a key is assigned to.
// Shards are picked from the high half of the hash, so the key is placed
// there. It is also kept in the low half for the shard maps.
// For a 4-shard cache:
// - key 0 -> shard 0
// - key 1 -> shard 1
// - key 5 -> shard 1 (5 & 3 = 1)
#[derive(Clone, Default)]
pub struct ShardControllingHasher;
impl BuildHasher for ShardControllingHasher {
  type Hasher = TestHasher;
  fn build_hasher(&self) -> Self::Hasher {
    TestHasher(0)
  }
}
pub struct TestHasher(u64);
impl Hasher for TestHasher {
  fn finish(&self) -> u64 {
    self.0
  }
  fn write(&mut self, _: &[u8]) {
    unimplemented!()
  }
  fn write_i32(&mut self, i: i32) {
    let low = i as u32 as u64;
    self.0 = (low << 32) | low;
  }
}

/// A value that carries its own key and an adjustable weight.
#[derive(Debug)]
pub struct Blob {
  pub key: i32,
  pub weight: std::sync::atomic::AtomicU64,
}

impl Blob {
  pub fn new(key: i32, weight: u64) -> Self {
    Self {
      key,
      weight: std::sync::atomic::AtomicU64::new(weight),
    }
  }

  pub fn weight(&self) -> u64 {
    self.weight.load(std::sync::atomic::Ordering::Relaxed)
  }

  pub fn set_weight(&self, weight: u64) {
    self.weight.store(weight, std::sync::atomic::Ordering::Relaxed);
  }
}

impl CacheValue<i32> for Blob {
  fn cache_key(&self) -> &i32 {
    &self.key
  }
}

// Single shard, so capacity and ordering are exact.
pub fn build_test_cache(capacity: u64) -> SlruCache<i32, String> {
  init_logging();
  SlruCacheBuilder::new()
    .capacity(capacity)
    .shards(1)
    .younger_size_fraction(0.5)
    .build()
    .unwrap()
}

pub fn build_sharded_cache(shards: usize, capacity: u64) -> SlruCache<i32, String, ShardControllingHasher> {
  init_logging();
  SlruCacheBuilder::new()
    .shards(shards)
    .capacity(capacity)
    .hasher(ShardControllingHasher)
    .build()
    .unwrap()
}

pub fn build_blob_cache(capacity: u64) -> SlruCache<i32, Blob> {
  init_logging();
  SlruCacheBuilder::new()
    .capacity(capacity)
    .shards(1)
    .younger_size_fraction(0.5)
    .weigher(|blob: &Blob| blob.weight())
    .build()
    .unwrap()
}

pub fn build_sharded_blob_cache(
  shards: usize,
  capacity: u64,
) -> SlruCache<i32, Blob, ShardControllingHasher> {
  init_logging();
  SlruCacheBuilder::new()
    .shards(shards)
    .capacity(capacity)
    .younger_size_fraction(0.5)
    .hasher(ShardControllingHasher)
    .weigher(|blob: &Blob| blob.weight())
    .build()
    .unwrap()
}

/// Runs the whole insertion protocol for a key that is expected to be absent.
pub fn insert<K, V, H>(cache: &SlruCache<K, V, H>, key: K, value: V) -> Arc<V>
where
  K: Eq + std::hash::Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  let mut cookie = cache.begin_insert(key);
  assert!(cookie.is_active(), "key was expected to be absent");
  cookie.end_insert(value);
  cookie.value().try_get().unwrap().unwrap()
}

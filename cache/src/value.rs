use std::sync::Arc;

/// A cached value that knows the key it is stored under.
///
/// Implementing this trait unlocks the value-addressed operations
/// ([`touch_value`](crate::SlruCache::touch_value),
/// [`try_remove_value`](crate::SlruCache::try_remove_value) and
/// [`update_weight_value`](crate::SlruCache::update_weight_value)). The key is
/// hashed to find the owning shard, so it must never change for the lifetime
/// of the value.
pub trait CacheValue<K> {
  fn cache_key(&self) -> &K;
}

/// Computes the weight of a value. Called once when the value is admitted and
/// again on every `update_weight`, never while a shard lock is held.
pub type Weigher<V> = Arc<dyn Fn(&V) -> u64 + Send + Sync>;

pub(crate) fn unit_weigher<V>() -> Weigher<V> {
  Arc::new(|_| 1)
}

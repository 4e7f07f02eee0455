use crate::listener::EvictionReason;

use std::sync::Arc;

/// The verdict of [`CacheHooks::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
  Admit,
  /// The value is still handed to every waiter, but it is not cached.
  Decline,
}

/// Extension points invoked by the cache around admission and removal.
///
/// Every method is called outside of any shard lock, so implementations may
/// take their own locks or do bookkeeping freely. They must not call back into
/// the same cache key's insertion protocol, since the caller of `end_insert`
/// is still inside it.
///
/// All methods default to no-ops.
pub trait CacheHooks<K, V>: Send + Sync {
  /// Asked once per `end_insert`, before the value is linked into the cache.
  fn admit(&self, _key: &K, _value: &Arc<V>, _weight: u64) -> AdmissionDecision {
    AdmissionDecision::Admit
  }

  /// A value became resident, either through `end_insert` or resurrection.
  fn on_admitted(&self, _key: &K, _value: &Arc<V>, _weight: u64) {}

  /// A resident value left the cache. Paired with exactly one earlier
  /// `on_admitted` for the same value.
  fn on_removed(&self, _key: &K, _value: &Arc<V>, _weight: u64, _reason: EvictionReason) {}

  /// The weight of a resident value changed through `update_weight`.
  fn on_weight_updated(&self, _key: &K, _value: &Arc<V>, _old_weight: u64, _new_weight: u64) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl<K, V> CacheHooks<K, V> for NoopHooks {}

impl<K, V, T> CacheHooks<K, V> for Arc<T>
where
  T: CacheHooks<K, V> + ?Sized,
{
  fn admit(&self, key: &K, value: &Arc<V>, weight: u64) -> AdmissionDecision {
    (**self).admit(key, value, weight)
  }

  fn on_admitted(&self, key: &K, value: &Arc<V>, weight: u64) {
    (**self).on_admitted(key, value, weight)
  }

  fn on_removed(&self, key: &K, value: &Arc<V>, weight: u64, reason: EvictionReason) {
    (**self).on_removed(key, value, weight, reason)
  }

  fn on_weight_updated(&self, key: &K, value: &Arc<V>, old_weight: u64, new_weight: u64) {
    (**self).on_weight_updated(key, value, old_weight, new_weight)
  }
}

use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry was removed from the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The entry was removed to bring the cache back under its weight capacity.
  Capacity,
  /// The entry was removed with `try_remove`.
  Invalidated,
  /// The entry was dropped by `clear`.
  Cleared,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Invalidated => write!(f, "manually invalidated"),
      EvictionReason::Cleared => write!(f, "cleared"),
    }
  }
}

/// A listener that can be registered with the cache to receive notifications
/// when entries are removed.
///
/// Notifications are delivered on a dedicated background thread through a
/// bounded channel so a slow listener never blocks cache operations. When the
/// channel is full the notification is dropped. Use [`CacheHooks`] instead
/// when every removal must be observed synchronously.
///
/// [`CacheHooks`]: crate::CacheHooks
pub trait EvictionListener<K, V>: Send + Sync {
  fn on_evict(&self, key: K, value: Arc<V>, reason: EvictionReason);
}

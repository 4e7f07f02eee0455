use crate::future::Promise;
use crate::segment::Lane;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use generational_arena::Index;

/// The state of a key inside a shard map.
pub(crate) enum Item<V> {
  /// A population is in flight. `async_hits` counts lookups that found the
  /// key before it resolved.
  Pending {
    promise: Arc<Promise<V>>,
    async_hits: AtomicU64,
  },
  /// The value is resident; the index points into the shard's node arena.
  Resolved(Index),
}

impl<V> Item<V> {
  pub(crate) fn pending(promise: Arc<Promise<V>>) -> Self {
    Item::Pending {
      promise,
      async_hits: AtomicU64::new(0),
    }
  }

  /// Returns `true` if this is the pending item owned by `promise`.
  pub(crate) fn is_pending_for(&self, promise: &Arc<Promise<V>>) -> bool {
    match self {
      Item::Pending { promise: own, .. } => Arc::ptr_eq(own, promise),
      Item::Resolved(_) => false,
    }
  }
}

/// A resolved item, linked into exactly one segment.
#[derive(Debug)]
pub(crate) struct Node<K, V> {
  pub(crate) key: K,
  pub(crate) value: Arc<V>,
  pub(crate) weight: u64,
  pub(crate) lane: Lane,
  /// Lookups that waited on this item while it was still pending.
  pub(crate) async_hits: u64,
  pub(crate) prev: Option<Index>,
  pub(crate) next: Option<Index>,
}

impl<K, V> Node<K, V> {
  pub(crate) fn new(key: K, value: Arc<V>, weight: u64, async_hits: u64) -> Self {
    Self {
      key,
      value,
      weight,
      lane: Lane::Younger,
      async_hits,
      prev: None,
      next: None,
    }
  }
}

use crate::config::ResurrectionPolicy;
use crate::error::InsertError;
use crate::future::Promise;
use crate::hooks::{AdmissionDecision, CacheHooks};
use crate::item::Item;
use crate::listener::EvictionReason;
use crate::metrics::Metrics;
use crate::shard::{Removal, Shard, ShardLimits};
use crate::task::notifier::Notifier;
use crate::value::Weigher;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// The internal, thread-safe core of the cache, shared by every handle and
/// every outstanding insert cookie.
pub(crate) struct CacheShared<K: Send, V: Send + Sync, H> {
  pub(crate) shards: Box<[CachePadded<Shard<K, V, H>>]>,
  pub(crate) hasher: H,
  pub(crate) capacity: AtomicU64,
  // `f64` bits.
  pub(crate) younger_fraction: AtomicU64,
  pub(crate) weigher: Weigher<V>,
  pub(crate) hooks: Arc<dyn CacheHooks<K, V>>,
  pub(crate) resurrection: ResurrectionPolicy,
  pub(crate) metrics: Metrics,
  pub(crate) notifier: Option<Notifier<K, V>>,
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for CacheShared<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheShared")
      .field("capacity", &self.capacity.load(Ordering::Relaxed))
      .field("younger_fraction", &self.younger_fraction())
      .field("shards", &self.shards.len())
      .field("resurrection", &self.resurrection)
      .field("metrics", &self.metrics.snapshot())
      .finish_non_exhaustive()
  }
}

impl<K: Send, V: Send + Sync, H> Drop for CacheShared<K, V, H> {
  fn drop(&mut self) {
    if let Some(notifier) = self.notifier.take() {
      notifier.stop();
    }
  }
}

impl<K: Send, V: Send + Sync, H> CacheShared<K, V, H> {
  #[inline]
  pub(crate) fn younger_fraction(&self) -> f64 {
    f64::from_bits(self.younger_fraction.load(Ordering::Acquire))
  }

  /// The limits `shard` is trimmed against. Capacity is split evenly and the
  /// remainder goes to the lowest shards, so the shares add up to exactly the
  /// cache capacity.
  pub(crate) fn limits(&self, shard: &Shard<K, V, H>) -> ShardLimits {
    let capacity = self.capacity.load(Ordering::Acquire);
    let shards = self.shards.len() as u64;
    let share = capacity / shards + u64::from((shard.index as u64) < capacity % shards);
    ShardLimits::new(share, self.younger_fraction())
  }

  pub(crate) fn store_limits(&self, capacity: u64, younger_fraction: f64) {
    self.capacity.store(capacity, Ordering::Release);
    self
      .younger_fraction
      .store(younger_fraction.to_bits(), Ordering::Release);
  }
}

impl<K, V, H> CacheShared<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  /// Picks the shard for a key.
  ///
  /// Shard maps hash with the same hasher and use the low bits for bucket
  /// selection, so the shard is chosen from the high half of the hash.
  #[inline]
  pub(crate) fn shard_index<Q>(&self, key: &Q) -> usize
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let hash = self.hasher.hash_one(key);
    (hash >> 32) as usize & (self.shards.len() - 1)
  }

  #[inline]
  pub(crate) fn shard<Q>(&self, key: &Q) -> &Shard<K, V, H>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    &self.shards[self.shard_index(key)]
  }

  /// Applies the buffered touches of a shard that reported a full buffer.
  pub(crate) fn drain_touches(&self, shard: &Shard<K, V, H>) {
    let mut state = shard.state.write();
    state.drain_touches(&shard.touches);
    tracing::trace!("drained full touch buffer");
  }

  /// Resolves a pending item. Called by the active cookie exactly once.
  pub(crate) fn end_insert(&self, key: &K, promise: &Arc<Promise<V>>, value: Arc<V>) {
    let weight = (self.weigher)(&value);
    let shard = self.shard(key);

    if self.hooks.admit(key, &value, weight) == AdmissionDecision::Decline {
      {
        let mut state = shard.state.write();
        if state.items.get(key).is_some_and(|item| item.is_pending_for(promise)) {
          state.items.remove(key);
        }
      }
      self.metrics.admissions_declined.fetch_add(1, Ordering::Relaxed);
      tracing::debug!(weight, "admission declined, value handed to waiters only");
      promise.complete(Ok(value));
      return;
    }

    let mut removals = Vec::new();
    let admitted = {
      let mut state = shard.state.write();
      let async_hits = match state.items.get(key) {
        Some(Item::Pending {
          promise: own,
          async_hits,
        }) if Arc::ptr_eq(own, promise) => Some(async_hits.load(Ordering::Relaxed)),
        _ => None,
      };
      match async_hits {
        Some(async_hits) => {
          let index = state.insert_resolved(key.clone(), value.clone(), weight, async_hits);
          // Counted before the item can be evicted by anyone else.
          self.metrics.record_admitted(weight);
          // Waiters already asked for it, so it has earned its second hit.
          // A full buffer needs no extra drain, trim applies it right below.
          if async_hits > 0 {
            shard.touches.push(index);
          }
          state.trim(self.limits(shard), &shard.touches, &mut removals);
          true
        }
        None => false,
      }
    };

    promise.complete(Ok(value.clone()));

    if admitted {
      self.metrics.inserts.fetch_add(1, Ordering::Relaxed);
      self.hooks.on_admitted(key, &value, weight);
    } else {
      tracing::warn!("pending item vanished before end_insert, value not cached");
    }
    self.dispatch_removals(removals);
  }

  /// Abandons a pending item and fails every waiter with `error`.
  pub(crate) fn cancel(&self, key: &K, promise: &Arc<Promise<V>>, error: InsertError) {
    {
      let mut state = self.shard(key).state.write();
      if state.items.get(key).is_some_and(|item| item.is_pending_for(promise)) {
        state.items.remove(key);
      }
    }
    self.metrics.cancellations.fetch_add(1, Ordering::Relaxed);
    tracing::debug!(%error, "insertion cancelled");
    promise.complete(Err(error));
  }

  /// Reports removed values to metrics, hooks and the eviction listener.
  /// Must be called after the shard lock is released.
  pub(crate) fn dispatch_removals(&self, removals: Vec<Removal<K, V>>) {
    for removal in removals {
      let counter = match removal.reason {
        EvictionReason::Capacity => &self.metrics.evicted_by_capacity,
        EvictionReason::Invalidated => &self.metrics.invalidations,
        EvictionReason::Cleared => &self.metrics.cleared,
      };
      counter.fetch_add(1, Ordering::Relaxed);
      self
        .metrics
        .current_weight
        .fetch_sub(removal.weight, Ordering::Relaxed);

      self
        .hooks
        .on_removed(&removal.key, &removal.value, removal.weight, removal.reason);
      if let Some(notifier) = &self.notifier {
        notifier.notify(removal.key, removal.value, removal.reason);
      }
    }
  }
}

use crate::config::{validate_younger_fraction, ResurrectionPolicy};
use crate::cookie::InsertCookie;
use crate::error::{ConfigError, InsertError};
use crate::future::{Promise, ValueFuture};
use crate::item::Item;
use crate::listener::EvictionReason;
use crate::metrics::MetricsSnapshot;
use crate::segment::SegmentKind;
use crate::shard::{Shard, ShardState};
use crate::shared::CacheShared;
use crate::value::CacheValue;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// A sharded, weight-bounded, segmented-LRU cache with single-flight
/// population.
///
/// Cloning a `SlruCache` is cheap and yields another handle to the same cache.
///
/// Values are never produced by the cache itself. A caller that misses calls
/// [`begin_insert`](Self::begin_insert), and the one caller that receives an
/// active [`InsertCookie`] produces the value while everyone else waits on the
/// same [`ValueFuture`].
pub struct SlruCache<K: Send, V: Send + Sync, H = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, H>>,
}

impl<K: Send, V: Send + Sync, H> Clone for SlruCache<K, V, H> {
  fn clone(&self) -> Self {
    Self {
      shared: self.shared.clone(),
    }
  }
}

impl<K: Send, V: Send + Sync, H> fmt::Debug for SlruCache<K, V, H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlruCache")
      .field("shared", &self.shared)
      .finish()
  }
}

impl<K, V, H> SlruCache<K, V, H>
where
  K: Eq + Hash + Clone + Send,
  V: Send + Sync,
  H: BuildHasher,
{
  /// Returns the resident value for `key` and records the access.
  ///
  /// A key whose population is still in flight counts as a miss here; use
  /// [`lookup`](Self::lookup) to wait for it instead.
  pub fn find<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let shard = self.shared.shard(key);
    let (value, drain) = {
      let state = shard.state.read();
      let Some((index, node)) = state.resolved(key) else {
        self.shared.metrics.record_miss();
        return None;
      };
      self.shared.metrics.record_sync_hit(node.weight);
      (node.value.clone(), shard.touches.push(index))
    };
    if drain {
      self.shared.drain_touches(shard);
    }
    Some(value)
  }

  /// Like [`find`](Self::find), but a key that is being populated yields the
  /// future of that population. `None` means nobody is producing the key and
  /// the caller should [`begin_insert`](Self::begin_insert) it.
  pub fn lookup<Q>(&self, key: &Q) -> Option<ValueFuture<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let shard = self.shared.shard(key);
    let (future, drain) = {
      let state = shard.state.read();
      match state.items.get(key) {
        Some(Item::Resolved(index)) => {
          let node = &state.nodes[*index];
          self.shared.metrics.record_sync_hit(node.weight);
          (
            ValueFuture::ready(node.value.clone()),
            shard.touches.push(*index),
          )
        }
        Some(Item::Pending {
          promise,
          async_hits,
        }) => {
          async_hits.fetch_add(1, Ordering::Relaxed);
          self.shared.metrics.async_hits.fetch_add(1, Ordering::Relaxed);
          (ValueFuture::shared(promise.clone()), false)
        }
        None => {
          self.shared.metrics.record_miss();
          return None;
        }
      }
    };
    if drain {
      self.shared.drain_touches(shard);
    }
    Some(future)
  }

  /// Claims the population of `key`.
  ///
  /// If the key is absent the returned cookie is active and the caller must
  /// produce the value. If the key is resident or already being populated the
  /// cookie is inactive and only carries the value future.
  ///
  /// When a value evicted for this key is still referenced elsewhere, the
  /// outcome depends on the configured [`ResurrectionPolicy`]: `Allow`
  /// re-admits that value and returns a resolved inactive cookie, `Forbid`
  /// returns an inactive cookie failed with [`InsertError::StaleValueAlive`].
  pub fn begin_insert(&self, key: K) -> InsertCookie<K, V, H> {
    let shard = self.shared.shard(&key);

    let value = {
      let mut state = shard.state.write();
      if let Some(future) = Self::in_cache(&state, &key) {
        return InsertCookie::inactive(self.shared.clone(), key, future);
      }
      let Some(value) = state.tracked_alive(&key) else {
        return self.begin_population(&mut state, key);
      };
      if self.shared.resurrection == ResurrectionPolicy::Forbid {
        tracing::debug!("refusing insertion while an evicted value is still referenced");
        let future = ValueFuture::failed(InsertError::StaleValueAlive);
        return InsertCookie::inactive(self.shared.clone(), key, future);
      }
      value
    };

    // Re-weighed, since the value may have changed while it was out.
    let weight = (self.shared.weigher)(&value);
    let mut removals = Vec::new();
    {
      let mut state = shard.state.write();
      if let Some(future) = Self::in_cache(&state, &key) {
        return InsertCookie::inactive(self.shared.clone(), key, future);
      }
      match state.tracked_alive(&key) {
        Some(tracked) if Arc::ptr_eq(&tracked, &value) => {}
        // Forgotten or replaced while unlocked.
        _ => return self.begin_population(&mut state, key),
      }
      state.forget_tracked(&key);
      state.insert_resolved(key.clone(), value.clone(), weight, 0);
      self.shared.metrics.record_admitted(weight);
      state.trim(self.shared.limits(shard), &shard.touches, &mut removals);
    }

    self.shared.metrics.resurrections.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(weight, "resurrected evicted value");
    self.shared.hooks.on_admitted(&key, &value, weight);
    self.shared.dispatch_removals(removals);
    InsertCookie::inactive(self.shared.clone(), key, ValueFuture::ready(value))
  }

  /// Removes the resident value for `key`. Returns `true` if something was
  /// removed.
  ///
  /// With `forbid_resurrection` set, a cache using
  /// [`ResurrectionPolicy::Allow`] forgets the removed value, so the next
  /// `begin_insert` for the key starts a fresh population even while the old
  /// value is still referenced.
  pub fn try_remove<Q>(&self, key: &Q, forbid_resurrection: bool) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.remove_resident(self.shared.shard(key), key, None, forbid_resurrection)
  }

  /// Removes `value` if it is the value currently cached under its key.
  pub fn try_remove_value(&self, value: &Arc<V>, forbid_resurrection: bool) -> bool
  where
    V: CacheValue<K>,
  {
    let key = value.cache_key();
    self.remove_resident(self.shared.shard(key), key, Some(value), forbid_resurrection)
  }

  /// Records an access to `key` without returning it. Returns `false` if the
  /// key is not resident.
  pub fn touch<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.touch_resident(self.shared.shard(key), key, None)
  }

  /// Records an access to `value` if it is the value cached under its key.
  pub fn touch_value(&self, value: &Arc<V>) -> bool
  where
    V: CacheValue<K>,
  {
    let key = value.cache_key();
    self.touch_resident(self.shared.shard(key), key, Some(value))
  }

  /// Re-weighs the resident value for `key` in place, evicting if the shard
  /// is now over capacity. The item keeps its position. Returns `false` if
  /// the key is not resident.
  pub fn update_weight<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let shard = self.shared.shard(key);
    let resident = shard
      .state
      .read()
      .resolved(key)
      .map(|(_, node)| node.value.clone());
    match resident {
      Some(value) => self.reweigh_resident(shard, key, &value),
      None => false,
    }
  }

  /// Re-weighs `value` if it is the value cached under its key.
  pub fn update_weight_value(&self, value: &Arc<V>) -> bool
  where
    V: CacheValue<K>,
  {
    let key = value.cache_key();
    self.reweigh_resident(self.shared.shard(key), key, value)
  }

  /// Drops every resident value. Populations in flight are not affected.
  pub fn clear(&self) {
    for shard in self.shared.shards.iter() {
      let removals = shard.state.write().clear_resolved(&shard.touches);
      self.shared.dispatch_removals(removals);
    }
    tracing::debug!("cache cleared");
  }

  /// Snapshots every resident value, shard by shard.
  pub fn get_all(&self) -> Vec<Arc<V>> {
    let mut values = Vec::new();
    for shard in self.shared.shards.iter() {
      values.extend(shard.state.read().values());
    }
    values
  }

  /// Applies a new capacity and younger fraction, then trims every shard to
  /// the new limits before returning.
  pub fn reconfigure(&self, capacity: u64, younger_size_fraction: f64) -> Result<(), ConfigError> {
    if capacity == 0 {
      return Err(ConfigError::ZeroCapacity);
    }
    validate_younger_fraction(younger_size_fraction)?;

    self.shared.store_limits(capacity, younger_size_fraction);
    if capacity < self.shared.shards.len() as u64 {
      tracing::warn!(
        capacity,
        shards = self.shared.shards.len(),
        "capacity is smaller than the shard count, some shards cannot hold anything"
      );
    }

    for shard in self.shared.shards.iter() {
      let mut removals = Vec::new();
      let limits = self.shared.limits(shard);
      shard.state.write().trim(limits, &shard.touches, &mut removals);
      self.shared.dispatch_removals(removals);
    }
    tracing::info!(capacity, younger_size_fraction, "cache reconfigured");
    Ok(())
  }

  /// Returns the resident value for `key` without recording an access or
  /// touching the metrics.
  pub fn peek<Q>(&self, key: &Q) -> Option<Arc<V>>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let shard = self.shared.shard(key);
    let state = shard.state.read();
    state.resolved(key).map(|(_, node)| node.value.clone())
  }

  /// Returns the segment the resident value for `key` currently lives in.
  ///
  /// Buffered touches are not applied first, so a freshly touched item may
  /// still report `Younger`.
  pub fn segment<Q>(&self, key: &Q) -> Option<SegmentKind>
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let shard = self.shared.shard(key);
    let state = shard.state.read();
    state.resolved(key).map(|(index, _)| state.segment_of(index))
  }

  /// Returns `true` if a value for `key` is resident.
  pub fn contains_key<Q>(&self, key: &Q) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    self.shared.shard(key).state.read().resolved(key).is_some()
  }

  /// Number of resident values.
  pub fn size(&self) -> usize {
    self.sum_shards(|state| state.len() as u64) as usize
  }

  /// Total weight of all resident values.
  pub fn weight(&self) -> u64 {
    self.sum_shards(|state| state.weight())
  }

  pub fn younger_weight(&self) -> u64 {
    self.sum_shards(|state| state.younger_weight())
  }

  pub fn older_weight(&self) -> u64 {
    self.sum_shards(|state| state.older_weight())
  }

  /// The configured total weight capacity.
  ///
  /// Each shard enforces its own share of it, roughly `capacity / shard_count`,
  /// so no single value heavier than its shard's share can stay cached.
  pub fn capacity(&self) -> u64 {
    self.shared.capacity.load(Ordering::Acquire)
  }

  pub fn younger_size_fraction(&self) -> f64 {
    self.shared.younger_fraction()
  }

  /// Number of shards. Each one evicts against its own share of
  /// [`capacity`](Self::capacity), not against the total.
  pub fn shard_count(&self) -> usize {
    self.shared.shards.len()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.shared.metrics.snapshot()
  }

  /// The future of a key that is already resident or being populated.
  fn in_cache(state: &ShardState<K, V, H>, key: &K) -> Option<ValueFuture<V>> {
    match state.items.get(key)? {
      Item::Pending { promise, .. } => Some(ValueFuture::shared(promise.clone())),
      Item::Resolved(index) => Some(ValueFuture::ready(state.nodes[*index].value.clone())),
    }
  }

  /// Registers a pending item for an absent key and hands out the active
  /// cookie.
  fn begin_population(&self, state: &mut ShardState<K, V, H>, key: K) -> InsertCookie<K, V, H> {
    let promise = Arc::new(Promise::new());
    state.items.insert(key.clone(), Item::pending(promise.clone()));
    InsertCookie::active(self.shared.clone(), key, promise)
  }

  fn sum_shards(&self, f: impl Fn(&ShardState<K, V, H>) -> u64) -> u64 {
    self
      .shared
      .shards
      .iter()
      .map(|shard| f(&*shard.state.read()))
      .sum()
  }

  fn remove_resident<Q>(
    &self,
    shard: &Shard<K, V, H>,
    key: &Q,
    expected: Option<&Arc<V>>,
    forbid_resurrection: bool,
  ) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let track = !(forbid_resurrection && self.shared.resurrection == ResurrectionPolicy::Allow);
    let removal = {
      let mut state = shard.state.write();
      let Some((index, node)) = state.resolved(key) else {
        return false;
      };
      if expected.is_some_and(|value| !Arc::ptr_eq(value, &node.value)) {
        return false;
      }
      state.remove(index, EvictionReason::Invalidated, track)
    };
    self.shared.dispatch_removals(vec![removal]);
    true
  }

  fn touch_resident<Q>(&self, shard: &Shard<K, V, H>, key: &Q, expected: Option<&Arc<V>>) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    let drain = {
      let state = shard.state.read();
      let Some((index, node)) = state.resolved(key) else {
        return false;
      };
      if expected.is_some_and(|value| !Arc::ptr_eq(value, &node.value)) {
        return false;
      }
      shard.touches.push(index)
    };
    if drain {
      self.shared.drain_touches(shard);
    }
    true
  }

  fn reweigh_resident<Q>(&self, shard: &Shard<K, V, H>, key: &Q, value: &Arc<V>) -> bool
  where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
  {
    // Weighed before locking; the value is immutable so the result holds.
    let new_weight = (self.shared.weigher)(value);
    let mut removals = Vec::new();

    let (owned_key, old_weight) = {
      let mut state = shard.state.write();
      let Some((index, node)) = state.resolved(key) else {
        return false;
      };
      if !Arc::ptr_eq(value, &node.value) {
        return false;
      }
      let owned_key = node.key.clone();
      let old_weight = state.reweigh(index, new_weight);
      self.shared.metrics.record_reweigh(old_weight, new_weight);

      let limits = self.shared.limits(shard);
      if state.weight() > limits.capacity {
        state.trim(limits, &shard.touches, &mut removals);
      }
      (owned_key, old_weight)
    };

    if old_weight != new_weight {
      tracing::trace!(old_weight, new_weight, "value re-weighed");
    }
    self
      .shared
      .hooks
      .on_weight_updated(&owned_key, value, old_weight, new_weight);
    self.shared.dispatch_removals(removals);
    true
  }
}
